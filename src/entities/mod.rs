pub mod prelude;

pub mod credential_changes;
