//! Typed view of server callbacks.
//!
//! [`Callback::parse`] classifies a [`CallbackEnvelope`] by name and decodes
//! its positional arguments. Names without a dedicated variant, and any
//! callback from a newer API, come back as [`Callback::Other`].

use serde::de::DeserializeOwned;

use crate::codec::Value;
use crate::connection::CallbackEnvelope;
use crate::error::{GbxError, Result};
use crate::marshal::{decode_text, decode_text_list, FromValue, MapInfo};

pub const PLAYER_CONNECT: &str = "ManiaPlanet.PlayerConnect";
pub const PLAYER_DISCONNECT: &str = "ManiaPlanet.PlayerDisconnect";
pub const PLAYER_CHAT: &str = "ManiaPlanet.PlayerChat";
pub const PLAYER_INFO_CHANGED: &str = "ManiaPlanet.PlayerInfoChanged";
pub const BEGIN_MAP: &str = "ManiaPlanet.BeginMap";
pub const END_MAP: &str = "ManiaPlanet.EndMap";
pub const BEGIN_MATCH: &str = "ManiaPlanet.BeginMatch";
pub const END_MATCH: &str = "ManiaPlanet.EndMatch";
pub const STATUS_CHANGED: &str = "ManiaPlanet.StatusChanged";
pub const SERVER_START: &str = "ManiaPlanet.ServerStart";
pub const SERVER_STOP: &str = "ManiaPlanet.ServerStop";
pub const MODE_SCRIPT_CALLBACK: &str = "ManiaPlanet.ModeScriptCallback";
pub const MODE_SCRIPT_CALLBACK_ARRAY: &str = "ManiaPlanet.ModeScriptCallbackArray";

/// Event raised by a mode script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCallback {
    pub name: String,
    pub params: Vec<String>,
}

impl ScriptCallback {
    /// Decode the first parameter as JSON.
    ///
    /// Script API callbacks carry a single JSON document.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.params.first().ok_or_else(|| {
            GbxError::marshal(self.name.as_str(), "no JSON parameter")
        })?;
        Ok(serde_json::from_str(body)?)
    }
}

/// A classified server callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    PlayerConnect {
        login: String,
        is_spectator: bool,
    },
    PlayerDisconnect {
        login: String,
        reason: String,
    },
    PlayerChat {
        player_uid: i32,
        login: String,
        text: String,
        is_command: bool,
    },
    /// Raw `SPlayerInfo` struct.
    PlayerInfoChanged(Value),
    BeginMap(MapInfo),
    EndMap(MapInfo),
    BeginMatch,
    EndMatch,
    StatusChanged {
        code: i32,
        name: String,
    },
    ServerStart,
    ServerStop,
    ModeScript(ScriptCallback),
    Other(CallbackEnvelope),
}

impl Callback {
    /// Classify `envelope` and decode its arguments.
    ///
    /// # Errors
    ///
    /// `Marshal` naming the callback and argument position when a known
    /// callback carries arguments of the wrong shape.
    pub fn parse(envelope: &CallbackEnvelope) -> Result<Self> {
        let args = Args::new(envelope);

        let callback = match envelope.name.as_str() {
            PLAYER_CONNECT => Callback::PlayerConnect {
                login: args.get(0)?,
                is_spectator: args.get_or_default(1)?,
            },
            PLAYER_DISCONNECT => Callback::PlayerDisconnect {
                login: args.get(0)?,
                reason: args.get_or_default(1)?,
            },
            PLAYER_CHAT => Callback::PlayerChat {
                player_uid: args.get(0)?,
                login: args.get(1)?,
                text: args.get_with(2, decode_text)?,
                is_command: args.get_or_default(3)?,
            },
            PLAYER_INFO_CHANGED => Callback::PlayerInfoChanged(args.get(0)?),
            BEGIN_MAP => Callback::BeginMap(args.get(0)?),
            END_MAP => Callback::EndMap(args.get(0)?),
            BEGIN_MATCH => Callback::BeginMatch,
            END_MATCH => Callback::EndMatch,
            STATUS_CHANGED => Callback::StatusChanged {
                code: args.get(0)?,
                name: args.get(1)?,
            },
            SERVER_START => Callback::ServerStart,
            SERVER_STOP => Callback::ServerStop,
            MODE_SCRIPT_CALLBACK | MODE_SCRIPT_CALLBACK_ARRAY => {
                Callback::ModeScript(script_callback(envelope)?)
            }
            _ => Callback::Other(envelope.clone()),
        };
        Ok(callback)
    }

    /// Callback name this variant was parsed from.
    pub fn name(&self) -> &str {
        match self {
            Callback::PlayerConnect { .. } => PLAYER_CONNECT,
            Callback::PlayerDisconnect { .. } => PLAYER_DISCONNECT,
            Callback::PlayerChat { .. } => PLAYER_CHAT,
            Callback::PlayerInfoChanged(_) => PLAYER_INFO_CHANGED,
            Callback::BeginMap(_) => BEGIN_MAP,
            Callback::EndMap(_) => END_MAP,
            Callback::BeginMatch => BEGIN_MATCH,
            Callback::EndMatch => END_MATCH,
            Callback::StatusChanged { .. } => STATUS_CHANGED,
            Callback::ServerStart => SERVER_START,
            Callback::ServerStop => SERVER_STOP,
            Callback::ModeScript(script) => &script.name,
            Callback::Other(envelope) => &envelope.name,
        }
    }
}

/// Unwrap a mode script envelope into the script event it carries.
///
/// `ModeScriptCallback` carries `(name, param)`; `ModeScriptCallbackArray`
/// carries `(name, [params])`.
pub fn script_callback(envelope: &CallbackEnvelope) -> Result<ScriptCallback> {
    let args = Args::new(envelope);
    let name: String = args.get(0)?;

    let params = if envelope.name == MODE_SCRIPT_CALLBACK_ARRAY {
        args.get_with(1, decode_text_list)?
    } else {
        vec![args.get_with(1, decode_text)?]
    };

    Ok(ScriptCallback { name, params })
}

/// Positional argument reader with errors naming `Callback[index]`.
struct Args<'a> {
    envelope: &'a CallbackEnvelope,
}

impl<'a> Args<'a> {
    fn new(envelope: &'a CallbackEnvelope) -> Self {
        Self { envelope }
    }

    fn target(&self, index: usize) -> String {
        format!("{}[{}]", self.envelope.name, index)
    }

    fn get_with<T>(&self, index: usize, decode: impl FnOnce(Value) -> Result<T>) -> Result<T> {
        let value = self
            .envelope
            .args
            .get(index)
            .cloned()
            .ok_or_else(|| GbxError::marshal(self.target(index), "missing"))?;

        decode(value).map_err(|e| match e {
            GbxError::Marshal { detail, .. } => GbxError::marshal(self.target(index), detail),
            other => other,
        })
    }

    fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        self.get_with(index, T::from_value)
    }

    fn get_or_default<T: FromValue + Default>(&self, index: usize) -> Result<T> {
        if index >= self.envelope.args.len() {
            return Ok(T::default());
        }
        self.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::ToValue;
    use serde::Deserialize;

    #[test]
    fn test_player_connect() {
        let envelope = CallbackEnvelope::new(
            PLAYER_CONNECT,
            vec![Value::from("login123"), Value::Boolean(false)],
        );
        assert_eq!(
            Callback::parse(&envelope).unwrap(),
            Callback::PlayerConnect {
                login: "login123".to_string(),
                is_spectator: false,
            }
        );
    }

    #[test]
    fn test_player_connect_without_spectator_flag() {
        let envelope = CallbackEnvelope::new(PLAYER_CONNECT, vec![Value::from("login123")]);
        let callback = Callback::parse(&envelope).unwrap();
        assert_eq!(callback.name(), PLAYER_CONNECT);
        assert!(matches!(
            callback,
            Callback::PlayerConnect { is_spectator: false, .. }
        ));
    }

    #[test]
    fn test_player_chat_strips_marker() {
        let envelope = CallbackEnvelope::new(
            PLAYER_CHAT,
            vec![
                Value::Int(7),
                Value::from("p1"),
                Value::from("\u{FEFF}gg wp ☺"),
                Value::Boolean(false),
            ],
        );
        match Callback::parse(&envelope).unwrap() {
            Callback::PlayerChat { text, player_uid, .. } => {
                assert_eq!(text, "gg wp ☺");
                assert_eq!(player_uid, 7);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_begin_map_decodes_map_info() {
        let map = MapInfo {
            name: "A01".to_string(),
            uid: "uid".to_string(),
            file_name: "A01.Map.Gbx".to_string(),
            ..MapInfo::default()
        };
        let envelope = CallbackEnvelope::new(BEGIN_MAP, vec![map.to_value()]);
        assert_eq!(Callback::parse(&envelope).unwrap(), Callback::BeginMap(map));
    }

    #[test]
    fn test_bad_argument_names_position() {
        let envelope = CallbackEnvelope::new(STATUS_CHANGED, vec![Value::from("4")]);
        let err = Callback::parse(&envelope).unwrap_err();
        assert!(matches!(
            err,
            GbxError::Marshal { ref target, .. } if target == "ManiaPlanet.StatusChanged[0]"
        ));
    }

    #[test]
    fn test_unknown_callback_is_other() {
        let envelope = CallbackEnvelope::new("ManiaPlanet.BillUpdated", vec![Value::Int(1)]);
        assert_eq!(
            Callback::parse(&envelope).unwrap(),
            Callback::Other(envelope.clone())
        );
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct WayPoint {
        login: String,
        racetime: i32,
        checkpointinrace: i32,
    }

    #[test]
    fn test_script_callback_array_json() {
        let envelope = CallbackEnvelope::new(
            MODE_SCRIPT_CALLBACK_ARRAY,
            vec![
                Value::from("Trackmania.Event.WayPoint"),
                Value::Array(vec![Value::from(
                    r#"{"login":"p1","racetime":23450,"checkpointinrace":3}"#,
                )]),
            ],
        );

        let Callback::ModeScript(script) = Callback::parse(&envelope).unwrap() else {
            panic!("expected mode script callback");
        };
        assert_eq!(script.name, "Trackmania.Event.WayPoint");
        let waypoint: WayPoint = script.json().unwrap();
        assert_eq!(
            waypoint,
            WayPoint {
                login: "p1".to_string(),
                racetime: 23450,
                checkpointinrace: 3,
            }
        );
    }

    #[test]
    fn test_script_callback_single_param() {
        let envelope = CallbackEnvelope::new(
            MODE_SCRIPT_CALLBACK,
            vec![Value::from("LibXmlRpc_BeginTurn"), Value::from("2")],
        );
        let script = script_callback(&envelope).unwrap();
        assert_eq!(script.params, vec!["2".to_string()]);
        assert!(matches!(script.json::<i32>(), Ok(2)));
    }

    #[test]
    fn test_script_callback_bad_json() {
        let script = ScriptCallback {
            name: "Shootmania.Event.OnHit".to_string(),
            params: vec!["{not json".to_string()],
        };
        assert!(matches!(
            script.json::<serde_json::Value>(),
            Err(GbxError::Json(_))
        ));
    }
}
