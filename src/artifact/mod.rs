mod manifest;
mod metadata;

pub(crate) use manifest::*;
pub(crate) use metadata::*;
