use anyhow::{Result, anyhow};

use crate::models::notice::Channel;

/// Shape check for the transport address on an outbox row. Failing here is a
/// permanent condition: the address on an immutable event will not improve
/// between drain passes.
pub fn validate_recipient(channel: Channel, recipient: &str) -> Result<()> {
    if recipient.trim().is_empty() {
        return Err(anyhow!("Recipient address cannot be empty"));
    }

    match channel {
        Channel::Email => {
            let (local, domain) = recipient
                .split_once('@')
                .ok_or_else(|| anyhow!("Email address is missing '@'"))?;

            if local.is_empty() || !domain.contains('.') {
                return Err(anyhow!("Email address is malformed"));
            }
        }
        Channel::Sms => {
            let digits = recipient.chars().filter(char::is_ascii_digit).count();

            if digits < 7 {
                return Err(anyhow!("Phone number too short (minimum 7 digits)"));
            }

            let valid_chars = recipient
                .chars()
                .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ' || c == '(' || c == ')');

            if !valid_chars {
                return Err(anyhow!("Phone number contains invalid characters"));
            }
        }
    }

    Ok(())
}
