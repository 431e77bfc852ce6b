pub mod header;

#[macro_export]
macro_rules! def_pub_const {
    // 批量常量定义
    ($($(#[$meta:meta])* $name:ident = $value:expr),+ $(,)?) => {
        $(
            $(#[$meta])*
            pub const $name: &'static str = $value;
        )+
    };
}

#[macro_export]
macro_rules! define_typed_constants {
    // 递归情况：处理一个类型块，然后继续处理剩余的
    (
        $vis:vis $ty:ty => {
            $(
                $(#[$attr:meta])*
                $name:ident = $value:expr
            ),* $(,)?
        }
        $($rest:tt)*
    ) => {
        $(
            $(#[$attr])*
            $vis const $name: $ty = $value;
        )*

        $crate::define_typed_constants! {
            $($rest)*
        }
    };

    // 基础情况：没有更多内容时停止
    () => {};
}

// Package related constants
def_pub_const!(PKG_VERSION = env!("CARGO_PKG_VERSION"), PKG_NAME = env!("CARGO_PKG_NAME"));

// Route related constants
def_pub_const!(
    ROUTE_CHAT_PATH = "/chat",
    ROUTE_THREAD_PATH = "/thread",
    ROUTE_HEALTH_PATH = "/health",
);

// Stream markers
def_pub_const!(
    /// Terminal sentinel, always the last frame of a stream
    DONE_SENTINEL = "[DONE]",
    /// Prefix of the in-stream failure indicator
    ERROR_PREFIX = "[ERROR]",
    SSE_DATA_PREFIX = "data: ",
    SSE_FRAME_END = "\n\n",
);

// Session identity
def_pub_const!(
    SESSION_COOKIE_NAME = "sid",
    SESSION_COOKIE_ATTRIBUTES = "Path=/; HttpOnly; SameSite=Lax",
);

// Environment keys
def_pub_const!(
    ENV_OPENAI_API_KEY = "OPENAI_API_KEY",
    ENV_ASSISTANT_ID = "ASSISTANT_ID",
    ENV_HOST = "HOST",
    ENV_PORT = "PORT",
    ENV_UPSTREAM_BASE_URL = "UPSTREAM_BASE_URL",
    ENV_UPSTREAM_MODE = "UPSTREAM_MODE",
    ENV_POLL_INTERVAL_MS = "POLL_INTERVAL_MS",
    ENV_POLL_MAX_ATTEMPTS = "POLL_MAX_ATTEMPTS",
    ENV_SESSION_TTL_SECS = "SESSION_TTL_SECS",
    ENV_IDEMPOTENCY_LIMIT = "IDEMPOTENCY_LIMIT",
    ENV_REQUEST_BODY_LIMIT = "REQUEST_BODY_LIMIT",
    ENV_CONFIG_FILE = "CONFIG_FILE",
);

// Upstream defaults
def_pub_const!(
    DEFAULT_UPSTREAM_BASE_URL = "https://api.openai.com/v1",
    DEFAULT_HOST = "0.0.0.0",
    DEFAULT_CONFIG_FILE = "config.toml",
    OPENAI_BETA_ASSISTANTS = "assistants=v2",
);

define_typed_constants! {
    pub u16 => {
        DEFAULT_PORT = 5000,
    }
    pub u64 => {
        DEFAULT_POLL_INTERVAL_MS = 1000,
        DEFAULT_SESSION_TTL_SECS = 3600,
        /// Upper bound on the sweeper period
        MAX_SWEEP_INTERVAL_SECS = 60,
    }
    pub u32 => {
        DEFAULT_POLL_MAX_ATTEMPTS = 60,
    }
    pub usize => {
        DEFAULT_IDEMPOTENCY_LIMIT = 256,
        DEFAULT_REQUEST_BODY_LIMIT = 2_000_000,
        /// Longest client-supplied session id accepted
        MAX_SESSION_ID_LEN = 128,
    }
}
