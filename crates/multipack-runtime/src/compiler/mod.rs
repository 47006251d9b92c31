//! External bundler adapters.

mod command;

pub use command::{
    BUILD_CONFIG_ENV_KEY, CommandCompiler, OUTPUT_DIR_ENV_KEY, TARGET_ENV_KEY,
    log_compiler_message,
};
