//! Typed records returned and accepted by the dedicated server.
//!
//! Member names match the server's struct members exactly, including its
//! spelling (`Environnement`, `NbrLapsFinished`). Free-form text members
//! (nicknames, server and map names, comments) are secured on encode and
//! stripped on decode.

use super::{Fields, FromValue, StructBuilder, ToValue};
use crate::codec::Value;
use crate::error::Result;

/// Reply of `GetVersion`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Version {
    pub name: String,
    pub title_id: String,
    pub version: String,
    pub build: String,
    pub api_version: String,
}

impl FromValue for Version {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("Version", value)?;
        Ok(Self {
            name: f.required("Name")?,
            title_id: f.required("TitleId")?,
            version: f.required("Version")?,
            build: f.required("Build")?,
            api_version: f.or_default("ApiVersion")?,
        })
    }
}

impl ToValue for Version {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Name", &self.name)
            .field("TitleId", &self.title_id)
            .field("Version", &self.version)
            .field("Build", &self.build)
            .field("ApiVersion", &self.api_version)
            .build()
    }
}

/// Reply of `GetSystemInfo`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemInfo {
    pub published_ip: String,
    pub port: i32,
    pub p2p_port: i32,
    pub title_id: String,
    pub server_login: String,
    pub server_player_id: i32,
    pub connection_download_rate: i32,
    pub connection_upload_rate: i32,
    pub is_server: bool,
    pub is_dedicated: bool,
}

impl FromValue for SystemInfo {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("SystemInfo", value)?;
        Ok(Self {
            published_ip: f.required("PublishedIp")?,
            port: f.required("Port")?,
            p2p_port: f.required("P2PPort")?,
            title_id: f.or_default("TitleId")?,
            server_login: f.required("ServerLogin")?,
            server_player_id: f.required("ServerPlayerId")?,
            connection_download_rate: f.or_default("ConnectionDownloadRate")?,
            connection_upload_rate: f.or_default("ConnectionUploadRate")?,
            is_server: f.or_default("IsServer")?,
            is_dedicated: f.or_default("IsDedicated")?,
        })
    }
}

impl ToValue for SystemInfo {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("PublishedIp", &self.published_ip)
            .field("Port", &self.port)
            .field("P2PPort", &self.p2p_port)
            .field("TitleId", &self.title_id)
            .field("ServerLogin", &self.server_login)
            .field("ServerPlayerId", &self.server_player_id)
            .field("ConnectionDownloadRate", &self.connection_download_rate)
            .field("ConnectionUploadRate", &self.connection_upload_rate)
            .field("IsServer", &self.is_server)
            .field("IsDedicated", &self.is_dedicated)
            .build()
    }
}

/// Reply of `GetStatus`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Status {
    pub code: i32,
    pub name: String,
}

impl Status {
    /// Server status code while a map is being played.
    pub const PLAYING: i32 = 4;

    pub fn is_playing(&self) -> bool {
        self.code == Self::PLAYING
    }
}

impl FromValue for Status {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("Status", value)?;
        Ok(Self {
            code: f.required("Code")?,
            name: f.required("Name")?,
        })
    }
}

impl ToValue for Status {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Code", &self.code)
            .field("Name", &self.name)
            .build()
    }
}

/// Entry of `GetPlayerList`, or reply of `GetPlayerInfo`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerInfo {
    pub login: String,
    pub nick_name: String,
    pub player_id: i32,
    pub team_id: i32,
    pub spectator_status: i32,
    pub ladder_ranking: i32,
    pub flags: i32,
}

impl PlayerInfo {
    /// Check if the player is spectating.
    pub fn is_spectator(&self) -> bool {
        self.spectator_status % 10 != 0
    }
}

impl FromValue for PlayerInfo {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("PlayerInfo", value)?;
        Ok(Self {
            login: f.required("Login")?,
            nick_name: f.text("NickName")?,
            player_id: f.required("PlayerId")?,
            team_id: f.or_default("TeamId")?,
            spectator_status: f.or_default("SpectatorStatus")?,
            ladder_ranking: f.or_default("LadderRanking")?,
            flags: f.or_default("Flags")?,
        })
    }
}

impl ToValue for PlayerInfo {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Login", &self.login)
            .text("NickName", &self.nick_name)
            .field("PlayerId", &self.player_id)
            .field("TeamId", &self.team_id)
            .field("SpectatorStatus", &self.spectator_status)
            .field("LadderRanking", &self.ladder_ranking)
            .field("Flags", &self.flags)
            .build()
    }
}

/// Entry of `GetCurrentRanking`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerRanking {
    pub login: String,
    pub nick_name: String,
    pub player_id: i32,
    pub rank: i32,
    pub best_time: i32,
    pub best_checkpoints: Vec<i32>,
    pub score: i32,
    pub nbr_laps_finished: i32,
    pub ladder_score: f64,
}

impl FromValue for PlayerRanking {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("PlayerRanking", value)?;
        Ok(Self {
            login: f.required("Login")?,
            nick_name: f.text("NickName")?,
            player_id: f.required("PlayerId")?,
            rank: f.required("Rank")?,
            best_time: f.or_default("BestTime")?,
            best_checkpoints: f.or_default("BestCheckpoints")?,
            score: f.or_default("Score")?,
            nbr_laps_finished: f.or_default("NbrLapsFinished")?,
            ladder_score: f.or_default("LadderScore")?,
        })
    }
}

impl ToValue for PlayerRanking {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Login", &self.login)
            .text("NickName", &self.nick_name)
            .field("PlayerId", &self.player_id)
            .field("Rank", &self.rank)
            .field("BestTime", &self.best_time)
            .field("BestCheckpoints", &self.best_checkpoints)
            .field("Score", &self.score)
            .field("NbrLapsFinished", &self.nbr_laps_finished)
            .field("LadderScore", &self.ladder_score)
            .build()
    }
}

/// Reply of `GetServerOptions`; argument of `SetServerOptions`.
///
/// `Current*` members are read-only on the server; [`ServerOptions::settable`]
/// encodes only the members `SetServerOptions` accepts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerOptions {
    pub name: String,
    pub comment: String,
    pub password: String,
    pub password_for_spectator: String,
    pub current_max_players: i32,
    pub next_max_players: i32,
    pub current_max_spectators: i32,
    pub next_max_spectators: i32,
    pub keep_player_slots: bool,
    pub current_call_vote_time_out: i32,
    pub next_call_vote_time_out: i32,
    pub call_vote_ratio: f64,
    pub allow_map_download: bool,
    pub auto_save_replays: bool,
}

impl ServerOptions {
    /// Struct accepted by `SetServerOptions`.
    pub fn settable(&self) -> Value {
        StructBuilder::new()
            .text("Name", &self.name)
            .text("Comment", &self.comment)
            .field("Password", &self.password)
            .field("PasswordForSpectator", &self.password_for_spectator)
            .field("NextMaxPlayers", &self.next_max_players)
            .field("NextMaxSpectators", &self.next_max_spectators)
            .field("KeepPlayerSlots", &self.keep_player_slots)
            .field("NextCallVoteTimeOut", &self.next_call_vote_time_out)
            .field("CallVoteRatio", &self.call_vote_ratio)
            .field("AllowMapDownload", &self.allow_map_download)
            .field("AutoSaveReplays", &self.auto_save_replays)
            .build()
    }
}

impl FromValue for ServerOptions {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("ServerOptions", value)?;
        Ok(Self {
            name: f.text("Name")?,
            comment: f.text("Comment")?,
            password: f.or_default("Password")?,
            password_for_spectator: f.or_default("PasswordForSpectator")?,
            current_max_players: f.or_default("CurrentMaxPlayers")?,
            next_max_players: f.required("NextMaxPlayers")?,
            current_max_spectators: f.or_default("CurrentMaxSpectators")?,
            next_max_spectators: f.required("NextMaxSpectators")?,
            keep_player_slots: f.or_default("KeepPlayerSlots")?,
            current_call_vote_time_out: f.or_default("CurrentCallVoteTimeOut")?,
            next_call_vote_time_out: f.or_default("NextCallVoteTimeOut")?,
            call_vote_ratio: f.or_default("CallVoteRatio")?,
            allow_map_download: f.or_default("AllowMapDownload")?,
            auto_save_replays: f.or_default("AutoSaveReplays")?,
        })
    }
}

impl ToValue for ServerOptions {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .text("Name", &self.name)
            .text("Comment", &self.comment)
            .field("Password", &self.password)
            .field("PasswordForSpectator", &self.password_for_spectator)
            .field("CurrentMaxPlayers", &self.current_max_players)
            .field("NextMaxPlayers", &self.next_max_players)
            .field("CurrentMaxSpectators", &self.current_max_spectators)
            .field("NextMaxSpectators", &self.next_max_spectators)
            .field("KeepPlayerSlots", &self.keep_player_slots)
            .field("CurrentCallVoteTimeOut", &self.current_call_vote_time_out)
            .field("NextCallVoteTimeOut", &self.next_call_vote_time_out)
            .field("CallVoteRatio", &self.call_vote_ratio)
            .field("AllowMapDownload", &self.allow_map_download)
            .field("AutoSaveReplays", &self.auto_save_replays)
            .build()
    }
}

/// Entry of `GetMapList`, or reply of `GetCurrentMapInfo` / `GetMapInfo`.
///
/// Map list entries carry fewer members than the detailed replies; the
/// missing ones decode to their defaults.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapInfo {
    pub name: String,
    pub uid: String,
    pub file_name: String,
    pub author: String,
    pub environnement: String,
    pub map_type: String,
    pub map_style: String,
    pub gold_time: i32,
    pub author_time: i32,
    pub copper_price: i32,
    pub lap_race: bool,
    pub nb_laps: i32,
    pub nb_checkpoints: i32,
}

impl FromValue for MapInfo {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("MapInfo", value)?;
        Ok(Self {
            name: f.text("Name")?,
            uid: f.required("UId")?,
            file_name: f.required("FileName")?,
            author: f.or_default("Author")?,
            environnement: f.or_default("Environnement")?,
            map_type: f.or_default("MapType")?,
            map_style: f.or_default("MapStyle")?,
            gold_time: f.or_default("GoldTime")?,
            author_time: f.or_default("AuthorTime")?,
            copper_price: f.or_default("CopperPrice")?,
            lap_race: f.or_default("LapRace")?,
            nb_laps: f.or_default("NbLaps")?,
            nb_checkpoints: f.or_default("NbCheckpoints")?,
        })
    }
}

impl ToValue for MapInfo {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .text("Name", &self.name)
            .field("UId", &self.uid)
            .field("FileName", &self.file_name)
            .field("Author", &self.author)
            .field("Environnement", &self.environnement)
            .field("MapType", &self.map_type)
            .field("MapStyle", &self.map_style)
            .field("GoldTime", &self.gold_time)
            .field("AuthorTime", &self.author_time)
            .field("CopperPrice", &self.copper_price)
            .field("LapRace", &self.lap_race)
            .field("NbLaps", &self.nb_laps)
            .field("NbCheckpoints", &self.nb_checkpoints)
            .build()
    }
}

/// Entry of the ban, black, guest and ignore lists.
///
/// Only ban list entries carry a client name and an IP address.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListEntry {
    pub login: String,
    pub client_name: Option<String>,
    pub ip_address: Option<String>,
}

impl FromValue for ListEntry {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("ListEntry", value)?;
        Ok(Self {
            login: f.required("Login")?,
            client_name: f.optional_text("ClientName")?,
            ip_address: f.optional("IPAddress")?,
        })
    }
}

impl ToValue for ListEntry {
    fn to_value(&self) -> Value {
        let builder = StructBuilder::new().field("Login", &self.login);
        let builder = match &self.client_name {
            Some(name) => builder.text("ClientName", name),
            None => builder,
        };
        builder.optional("IPAddress", &self.ip_address).build()
    }
}

/// Per-command vote ratio of `GetCallVoteRatios`.
///
/// A ratio of `-1.0` disables the vote.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallVoteRatio {
    pub command: String,
    pub ratio: f64,
}

impl FromValue for CallVoteRatio {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("CallVoteRatio", value)?;
        Ok(Self {
            command: f.required("Command")?,
            ratio: f.required("Ratio")?,
        })
    }
}

impl ToValue for CallVoteRatio {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Command", &self.command)
            .field("Ratio", &self.ratio)
            .build()
    }
}

/// Per-player entry of [`NetworkStats`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerNetInfo {
    pub login: String,
    pub ip_address: String,
    pub last_transfer_time: i32,
    pub delta_between_two_last_net_state: i32,
    pub packet_loss_rate: f64,
}

impl FromValue for PlayerNetInfo {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("PlayerNetInfo", value)?;
        Ok(Self {
            login: f.required("Login")?,
            ip_address: f.required("IPAddress")?,
            last_transfer_time: f.or_default("LastTransferTime")?,
            delta_between_two_last_net_state: f.or_default("DeltaBetweenTwoLastNetState")?,
            packet_loss_rate: f.or_default("PacketLossRate")?,
        })
    }
}

impl ToValue for PlayerNetInfo {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Login", &self.login)
            .field("IPAddress", &self.ip_address)
            .field("LastTransferTime", &self.last_transfer_time)
            .field(
                "DeltaBetweenTwoLastNetState",
                &self.delta_between_two_last_net_state,
            )
            .field("PacketLossRate", &self.packet_loss_rate)
            .build()
    }
}

/// Reply of `GetNetworkStats`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkStats {
    pub uptime: i32,
    pub nbr_connection: i32,
    pub mean_connection_time: i32,
    pub mean_nbr_player: i32,
    pub recv_net_rate: i32,
    pub send_net_rate: i32,
    pub total_receiving_size: i32,
    pub total_sending_size: i32,
    pub player_net_infos: Vec<PlayerNetInfo>,
}

impl FromValue for NetworkStats {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("NetworkStats", value)?;
        Ok(Self {
            uptime: f.required("Uptime")?,
            nbr_connection: f.required("NbrConnection")?,
            mean_connection_time: f.or_default("MeanConnectionTime")?,
            mean_nbr_player: f.or_default("MeanNbrPlayer")?,
            recv_net_rate: f.or_default("RecvNetRate")?,
            send_net_rate: f.or_default("SendNetRate")?,
            total_receiving_size: f.or_default("TotalReceivingSize")?,
            total_sending_size: f.or_default("TotalSendingSize")?,
            player_net_infos: f.or_default("PlayerNetInfos")?,
        })
    }
}

impl ToValue for NetworkStats {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Uptime", &self.uptime)
            .field("NbrConnection", &self.nbr_connection)
            .field("MeanConnectionTime", &self.mean_connection_time)
            .field("MeanNbrPlayer", &self.mean_nbr_player)
            .field("RecvNetRate", &self.recv_net_rate)
            .field("SendNetRate", &self.send_net_rate)
            .field("TotalReceivingSize", &self.total_receiving_size)
            .field("TotalSendingSize", &self.total_sending_size)
            .field("PlayerNetInfos", &self.player_net_infos)
            .build()
    }
}

/// Parameter or command description of a mode script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptParamDesc {
    pub name: String,
    pub desc: String,
    pub kind: String,
    pub default: String,
}

impl FromValue for ScriptParamDesc {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("ScriptParamDesc", value)?;
        Ok(Self {
            name: f.required("Name")?,
            desc: f.or_default("Desc")?,
            kind: f.required("Type")?,
            default: f.or_default("Default")?,
        })
    }
}

impl ToValue for ScriptParamDesc {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Name", &self.name)
            .field("Desc", &self.desc)
            .field("Type", &self.kind)
            .field("Default", &self.default)
            .build()
    }
}

/// Reply of `GetModeScriptInfo`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptInfo {
    pub name: String,
    pub compatible_map_types: String,
    pub description: String,
    pub version: String,
    pub param_descs: Vec<ScriptParamDesc>,
    pub command_descs: Vec<ScriptParamDesc>,
}

impl FromValue for ScriptInfo {
    fn from_value(value: Value) -> Result<Self> {
        let mut f = Fields::new("ScriptInfo", value)?;
        Ok(Self {
            name: f.required("Name")?,
            compatible_map_types: f.or_default("CompatibleMapTypes")?,
            description: f.or_default("Description")?,
            version: f.or_default("Version")?,
            param_descs: f.or_default("ParamDescs")?,
            command_descs: f.or_default("CommandDescs")?,
        })
    }
}

impl ToValue for ScriptInfo {
    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Name", &self.name)
            .field("CompatibleMapTypes", &self.compatible_map_types)
            .field("Description", &self.description)
            .field("Version", &self.version)
            .field("ParamDescs", &self.param_descs)
            .field("CommandDescs", &self.command_descs)
            .build()
    }
}
