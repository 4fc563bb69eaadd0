pub(crate) mod its;

pub(crate) use its::*;
