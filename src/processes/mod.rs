pub mod stage;
pub mod trim;
