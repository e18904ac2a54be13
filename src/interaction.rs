use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

/// Custom ids carried by the bot's buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    RegisterTeam,
    EditTeam,
    DeleteTeam,
    CheckIn { scrim: String },
    TransferLobby { lobby: i32, date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown button id `{0}`")]
pub struct UnknownButton(pub String);

impl FromStr for ButtonAction {
    type Err = UnknownButton;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownButton(id.to_string());
        match id {
            "register_team" => return Ok(ButtonAction::RegisterTeam),
            "edit_team" => return Ok(ButtonAction::EditTeam),
            "delete_team" => return Ok(ButtonAction::DeleteTeam),
            _ => {}
        }
        if let Some(scrim) = id.strip_prefix("checkin_") {
            if scrim.is_empty() {
                return Err(unknown());
            }
            return Ok(ButtonAction::CheckIn {
                scrim: scrim.to_string(),
            });
        }
        if let Some(rest) = id.strip_prefix("transfer_lobby_") {
            let (lobby, date) = rest.split_once('_').ok_or_else(unknown)?;
            let lobby = lobby.parse::<i32>().map_err(|_| unknown())?;
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| unknown())?;
            return Ok(ButtonAction::TransferLobby { lobby, date });
        }
        Err(unknown())
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonAction::RegisterTeam => f.write_str("register_team"),
            ButtonAction::EditTeam => f.write_str("edit_team"),
            ButtonAction::DeleteTeam => f.write_str("delete_team"),
            ButtonAction::CheckIn { scrim } => write!(f, "checkin_{}", scrim),
            ButtonAction::TransferLobby { lobby, date } => {
                write!(f, "transfer_lobby_{}_{}", lobby, date.format("%Y-%m-%d"))
            }
        }
    }
}
