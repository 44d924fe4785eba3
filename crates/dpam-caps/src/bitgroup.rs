use thiserror::Error;
use tracing::debug;

/// Widest bit group that still packs into a `u64`.
pub const MAX_MEMBERS: usize = 64;

/// Errors produced by bit-group packing helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BitGroupError {
    /// Group declares more members than fit the packed value.
    #[error("bit group with {members} members exceeds the {MAX_MEMBERS}-bit limit")]
    TooWide { members: usize },
    /// Packed value has bits set above the last member.
    #[error("value {value} does not fit {members} member bits")]
    ValueTooWide { members: usize, value: u64 },
}

fn validate_width(members: usize) -> Result<(), BitGroupError> {
    if members > MAX_MEMBERS {
        return Err(BitGroupError::TooWide { members });
    }
    Ok(())
}

/// Pack member states into the group value; member `i` maps to bit `i`.
pub fn pack(states: &[bool]) -> Result<u64, BitGroupError> {
    validate_width(states.len())?;
    let value = states
        .iter()
        .enumerate()
        .filter(|(_, checked)| **checked)
        .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit));
    debug!(members = states.len(), value, "pack bit group");
    Ok(value)
}

/// Split a group value back into `members` states.
pub fn unpack(value: u64, members: usize) -> Result<Vec<bool>, BitGroupError> {
    validate_width(members)?;
    if members < MAX_MEMBERS && value >> members != 0 {
        return Err(BitGroupError::ValueTooWide { members, value });
    }
    let states = (0..members).map(|bit| value & (1u64 << bit) != 0).collect();
    debug!(members, value, "unpack bit group");
    Ok(states)
}

/// `", "`-joined names of the checked members, in declaration order.
pub fn checked_names<'a>(names: impl IntoIterator<Item = &'a str>, states: &[bool]) -> String {
    names
        .into_iter()
        .zip(states)
        .filter(|(_, checked)| **checked)
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(", ")
}
