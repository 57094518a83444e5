//! Version string shown by `--version` and logged at startup, assembled
//! at compile time from the values `build/build.rs` resolves.

const WITH_REVISION: &str = concat!(
    env!("TELGATE_VERSION_LABEL"),
    " rev ",
    env!("TELGATE_GIT_SHA"),
    ", built ",
    env!("TELGATE_BUILD_TIME"),
);
const WITHOUT_REVISION: &str = concat!(
    env!("TELGATE_VERSION_LABEL"),
    ", built ",
    env!("TELGATE_BUILD_TIME"),
);

// Builds from a source tarball have no git metadata to point at.
pub const VERSION: &str = if env!("TELGATE_GIT_SHA").is_empty() {
    WITHOUT_REVISION
} else {
    WITH_REVISION
};
