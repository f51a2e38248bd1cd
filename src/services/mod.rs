pub mod ai;
pub mod availability;
pub mod booking;
pub mod conversation;
pub mod dialogue;
pub mod events;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
