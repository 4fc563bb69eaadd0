mod dedup;
mod positions;
mod sample;
mod tools;

pub(crate) use dedup::*;
pub(crate) use positions::*;
pub(crate) use sample::*;
pub(crate) use tools::*;
