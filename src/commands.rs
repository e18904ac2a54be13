use scrimbot::error::BotError;

use crate::Data;

pub(crate) mod admin;
pub(crate) mod scrim;
pub(crate) mod slots;

pub(crate) fn all() -> Vec<poise::Command<Data, anyhow::Error>> {
    vec![admin::admin(), scrim::scrim(), slots::slots()]
}

/// Reply text for a failed engine call; infrastructure failures are logged.
pub(crate) fn rejection(err: &BotError) -> String {
    if err.is_infrastructure() {
        log::error!("{:#}", err);
    }
    err.user_message()
}
