//! Typed remote calls.
//!
//! Each function builds a [`RemoteCall`] carrying the method name, its
//! arguments, the minimum auth level the server expects and the decode
//! function for the reply. A call runs either now with
//! [`RemoteCall::call`] or on the next multicall with [`RemoteCall::queue`];
//! both decode the reply the same way.
//!
//! Free-form text arguments (chat messages, kick reasons, server names) are
//! secured before sending; text replies are stripped.
//!
//! # Example
//!
//! ```ignore
//! use gbxremote_client::methods;
//!
//! let players = methods::get_player_list(100, 0).call(&client).await?;
//!
//! let name = methods::get_server_name().queue(&client);
//! let status = methods::get_status().queue(&client);
//! let mut results = client.execute_multicall().await?;
//! println!("{} is {}", results.take(name)?, results.take(status)?.name);
//! ```

use crate::auth::AuthLevel;
use crate::client::GbxClient;
use crate::codec::{StructMap, Value};
use crate::error::Result;
use crate::marshal::{
    decode_text, decode_text_list, secure, secure_all, CallVoteRatio, Fields, FromValue,
    ListEntry, MapInfo, NetworkStats, PlayerInfo, PlayerRanking, ScriptInfo, ServerOptions,
    Status, SystemInfo, ToValue, Version,
};
use crate::multicall::Slot;

/// Spectator mode for [`force_spectator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectatorMode {
    /// Let the player choose.
    UserSelectable = 0,
    Spectator = 1,
    Player = 2,
    /// Spectator, allowed to switch back.
    SpectatorSelectable = 3,
}

/// A remote call ready to run now or to be queued.
#[must_use = "a RemoteCall does nothing until `call` or `queue` is used"]
pub struct RemoteCall<T> {
    method: &'static str,
    params: Vec<Value>,
    min_level: AuthLevel,
    decode: fn(Value) -> Result<T>,
}

impl<T: Send + 'static> RemoteCall<T> {
    pub fn new(
        method: &'static str,
        params: Vec<Value>,
        min_level: AuthLevel,
        decode: fn(Value) -> Result<T>,
    ) -> Self {
        Self {
            method,
            params,
            min_level,
            decode,
        }
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Minimum level the server requires for this call.
    pub fn min_level(&self) -> AuthLevel {
        self.min_level
    }

    /// Decode a raw reply the way this call does.
    pub fn decode(&self, value: Value) -> Result<T> {
        (self.decode)(value)
    }

    /// Execute now and decode the reply.
    pub async fn call(self, client: &GbxClient) -> Result<T> {
        client.check_level(self.method, self.min_level);
        let reply = client.execute(self.method, &self.params).await?;
        (self.decode)(reply)
    }

    /// Queue for the next multicall; the slot yields the decoded reply.
    pub fn queue(self, client: &GbxClient) -> Slot<T> {
        client.check_level(self.method, self.min_level);
        client.queue_with(self.method, self.params, self.decode)
    }
}

fn remote<T: Send + 'static>(
    method: &'static str,
    params: Vec<Value>,
    min_level: AuthLevel,
    decode: fn(Value) -> Result<T>,
) -> RemoteCall<T> {
    RemoteCall::new(method, params, min_level, decode)
}

/// `CurrentValue` of a `{CurrentValue, NextValue}` reply.
fn current_value(value: Value) -> Result<i32> {
    Fields::new("CurrentNextValue", value)?.required("CurrentValue")
}

fn text(s: &str) -> Value {
    Value::String(secure(s))
}

fn texts(items: &[&str]) -> Value {
    Value::Array(secure_all(items).into_iter().map(Value::String).collect())
}

// System

pub fn list_methods() -> RemoteCall<Vec<String>> {
    remote("system.listMethods", vec![], AuthLevel::User, FromValue::from_value)
}

pub fn method_signature(method: &str) -> RemoteCall<Value> {
    remote(
        "system.methodSignature",
        vec![Value::from(method)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn method_help(method: &str) -> RemoteCall<String> {
    remote(
        "system.methodHelp",
        vec![Value::from(method)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn get_version() -> RemoteCall<Version> {
    remote("GetVersion", vec![], AuthLevel::User, FromValue::from_value)
}

pub fn get_system_info() -> RemoteCall<SystemInfo> {
    remote("GetSystemInfo", vec![], AuthLevel::User, FromValue::from_value)
}

pub fn get_status() -> RemoteCall<Status> {
    remote("GetStatus", vec![], AuthLevel::User, FromValue::from_value)
}

pub fn get_network_stats() -> RemoteCall<NetworkStats> {
    remote("GetNetworkStats", vec![], AuthLevel::Admin, FromValue::from_value)
}

// Session

pub fn enable_callbacks(enable: bool) -> RemoteCall<bool> {
    remote(
        "EnableCallbacks",
        vec![Value::from(enable)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn set_api_version(version: &str) -> RemoteCall<bool> {
    remote(
        "SetApiVersion",
        vec![Value::from(version)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn change_auth_password(login: &str, password: &str) -> RemoteCall<bool> {
    remote(
        "ChangeAuthPassword",
        vec![Value::from(login), Value::from(password)],
        AuthLevel::SuperAdmin,
        FromValue::from_value,
    )
}

// Chat

pub fn chat_send(message: &str) -> RemoteCall<bool> {
    remote(
        "ChatSend",
        vec![text(message)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn chat_send_server_message(message: &str) -> RemoteCall<bool> {
    remote(
        "ChatSendServerMessage",
        vec![text(message)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

/// Send a server message to a comma-separated list of logins.
pub fn chat_send_server_message_to_login(message: &str, logins: &[&str]) -> RemoteCall<bool> {
    remote(
        "ChatSendServerMessageToLogin",
        vec![text(message), Value::from(logins.join(","))],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_chat_lines() -> RemoteCall<Vec<String>> {
    remote("GetChatLines", vec![], AuthLevel::Admin, decode_text_list)
}

pub fn chat_enable_manual_routing(enable: bool, auto_forward: bool) -> RemoteCall<bool> {
    remote(
        "ChatEnableManualRouting",
        vec![Value::from(enable), Value::from(auto_forward)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

/// Forward a routed chat line; an empty `destination` sends it to everyone.
pub fn chat_forward_to_login(message: &str, sender: &str, destination: &str) -> RemoteCall<bool> {
    remote(
        "ChatForwardToLogin",
        vec![text(message), Value::from(sender), Value::from(destination)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

// Players

pub fn get_player_list(max: i32, start: i32) -> RemoteCall<Vec<PlayerInfo>> {
    remote(
        "GetPlayerList",
        vec![Value::from(max), Value::from(start)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn get_player_info(login: &str) -> RemoteCall<PlayerInfo> {
    remote(
        "GetPlayerInfo",
        vec![Value::from(login)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn get_current_ranking(max: i32, start: i32) -> RemoteCall<Vec<PlayerRanking>> {
    remote(
        "GetCurrentRanking",
        vec![Value::from(max), Value::from(start)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn kick(login: &str, message: &str) -> RemoteCall<bool> {
    remote(
        "Kick",
        vec![Value::from(login), text(message)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn ban(login: &str, message: &str) -> RemoteCall<bool> {
    remote(
        "Ban",
        vec![Value::from(login), text(message)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn unban(login: &str) -> RemoteCall<bool> {
    remote(
        "UnBan",
        vec![Value::from(login)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_ban_list(max: i32, start: i32) -> RemoteCall<Vec<ListEntry>> {
    remote(
        "GetBanList",
        vec![Value::from(max), Value::from(start)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn clean_ban_list() -> RemoteCall<bool> {
    remote("CleanBanList", vec![], AuthLevel::Admin, FromValue::from_value)
}

pub fn black_list(login: &str) -> RemoteCall<bool> {
    remote(
        "BlackList",
        vec![Value::from(login)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn un_black_list(login: &str) -> RemoteCall<bool> {
    remote(
        "UnBlackList",
        vec![Value::from(login)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_black_list(max: i32, start: i32) -> RemoteCall<Vec<ListEntry>> {
    remote(
        "GetBlackList",
        vec![Value::from(max), Value::from(start)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn add_guest(login: &str) -> RemoteCall<bool> {
    remote(
        "AddGuest",
        vec![Value::from(login)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn remove_guest(login: &str) -> RemoteCall<bool> {
    remote(
        "RemoveGuest",
        vec![Value::from(login)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_guest_list(max: i32, start: i32) -> RemoteCall<Vec<ListEntry>> {
    remote(
        "GetGuestList",
        vec![Value::from(max), Value::from(start)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn ignore(login: &str) -> RemoteCall<bool> {
    remote(
        "Ignore",
        vec![Value::from(login)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn un_ignore(login: &str) -> RemoteCall<bool> {
    remote(
        "UnIgnore",
        vec![Value::from(login)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_ignore_list(max: i32, start: i32) -> RemoteCall<Vec<ListEntry>> {
    remote(
        "GetIgnoreList",
        vec![Value::from(max), Value::from(start)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn force_spectator(login: &str, mode: SpectatorMode) -> RemoteCall<bool> {
    remote(
        "ForceSpectator",
        vec![Value::from(login), Value::from(mode as i32)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn force_player_team(login: &str, team: i32) -> RemoteCall<bool> {
    remote(
        "ForcePlayerTeam",
        vec![Value::from(login), Value::from(team)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

// Server settings

pub fn get_server_name() -> RemoteCall<String> {
    remote("GetServerName", vec![], AuthLevel::User, decode_text)
}

pub fn set_server_name(name: &str) -> RemoteCall<bool> {
    remote(
        "SetServerName",
        vec![text(name)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_server_comment() -> RemoteCall<String> {
    remote("GetServerComment", vec![], AuthLevel::User, decode_text)
}

pub fn set_server_comment(comment: &str) -> RemoteCall<bool> {
    remote(
        "SetServerComment",
        vec![text(comment)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn set_server_password(password: &str) -> RemoteCall<bool> {
    remote(
        "SetServerPassword",
        vec![Value::from(password)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_max_players() -> RemoteCall<i32> {
    remote("GetMaxPlayers", vec![], AuthLevel::User, current_value)
}

pub fn set_max_players(max: i32) -> RemoteCall<bool> {
    remote(
        "SetMaxPlayers",
        vec![Value::from(max)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_max_spectators() -> RemoteCall<i32> {
    remote("GetMaxSpectators", vec![], AuthLevel::User, current_value)
}

pub fn set_max_spectators(max: i32) -> RemoteCall<bool> {
    remote(
        "SetMaxSpectators",
        vec![Value::from(max)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn get_server_options() -> RemoteCall<ServerOptions> {
    remote("GetServerOptions", vec![], AuthLevel::Admin, FromValue::from_value)
}

pub fn set_server_options(options: &ServerOptions) -> RemoteCall<bool> {
    remote(
        "SetServerOptions",
        vec![options.settable()],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

// Votes

pub fn get_call_vote_ratios() -> RemoteCall<Vec<CallVoteRatio>> {
    remote("GetCallVoteRatios", vec![], AuthLevel::User, FromValue::from_value)
}

pub fn set_call_vote_ratios(ratios: &[CallVoteRatio]) -> RemoteCall<bool> {
    remote(
        "SetCallVoteRatios",
        vec![ratios.to_value()],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn set_call_vote_timeout(timeout_ms: i32) -> RemoteCall<bool> {
    remote(
        "SetCallVoteTimeOut",
        vec![Value::from(timeout_ms)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn cancel_vote() -> RemoteCall<bool> {
    remote("CancelVote", vec![], AuthLevel::Admin, FromValue::from_value)
}

// Maps

pub fn get_current_map_info() -> RemoteCall<MapInfo> {
    remote("GetCurrentMapInfo", vec![], AuthLevel::User, FromValue::from_value)
}

pub fn get_next_map_info() -> RemoteCall<MapInfo> {
    remote("GetNextMapInfo", vec![], AuthLevel::User, FromValue::from_value)
}

pub fn get_map_info(file_name: &str) -> RemoteCall<MapInfo> {
    remote(
        "GetMapInfo",
        vec![Value::from(file_name)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn get_map_list(max: i32, start: i32) -> RemoteCall<Vec<MapInfo>> {
    remote(
        "GetMapList",
        vec![Value::from(max), Value::from(start)],
        AuthLevel::User,
        FromValue::from_value,
    )
}

pub fn add_map(file_name: &str) -> RemoteCall<bool> {
    remote(
        "AddMap",
        vec![Value::from(file_name)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn remove_map(file_name: &str) -> RemoteCall<bool> {
    remote(
        "RemoveMap",
        vec![Value::from(file_name)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn choose_next_map(file_name: &str) -> RemoteCall<bool> {
    remote(
        "ChooseNextMap",
        vec![Value::from(file_name)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn jump_to_map_ident(uid: &str) -> RemoteCall<bool> {
    remote(
        "JumpToMapIdent",
        vec![Value::from(uid)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

// Flow control

pub fn next_map() -> RemoteCall<bool> {
    remote("NextMap", vec![], AuthLevel::Admin, FromValue::from_value)
}

pub fn restart_map() -> RemoteCall<bool> {
    remote("RestartMap", vec![], AuthLevel::Admin, FromValue::from_value)
}

pub fn stop_server() -> RemoteCall<bool> {
    remote("StopServer", vec![], AuthLevel::SuperAdmin, FromValue::from_value)
}

pub fn quit_game() -> RemoteCall<bool> {
    remote("QuitGame", vec![], AuthLevel::SuperAdmin, FromValue::from_value)
}

// Mode scripts

pub fn get_mode_script_info() -> RemoteCall<ScriptInfo> {
    remote("GetModeScriptInfo", vec![], AuthLevel::Admin, FromValue::from_value)
}

pub fn get_mode_script_settings() -> RemoteCall<StructMap> {
    remote(
        "GetModeScriptSettings",
        vec![],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn set_mode_script_settings(settings: StructMap) -> RemoteCall<bool> {
    remote(
        "SetModeScriptSettings",
        vec![Value::Struct(settings)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn trigger_mode_script_event(name: &str, param: &str) -> RemoteCall<bool> {
    remote(
        "TriggerModeScriptEvent",
        vec![Value::from(name), text(param)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}

pub fn trigger_mode_script_event_array(name: &str, params: &[&str]) -> RemoteCall<bool> {
    remote(
        "TriggerModeScriptEventArray",
        vec![Value::from(name), texts(params)],
        AuthLevel::Admin,
        FromValue::from_value,
    )
}
