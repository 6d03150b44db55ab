pub(crate) mod sync;
pub(crate) mod uri;
pub(crate) mod utf;
