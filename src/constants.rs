//! Centralized constants for tether.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "tether";

/// Default provider when neither CLI flag nor config names one.
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Default chat model for Ollama.
pub const OLLAMA_DEFAULT_MODEL: &str = "qwen2.5-coder:7b";

/// Default chat model for LM Studio.
pub const LMSTUDIO_DEFAULT_MODEL: &str = "qwen2.5-7b-instruct";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Default base URL for a local Ollama server.
pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default base URL for a local LM Studio server.
pub const LMSTUDIO_DEFAULT_BASE_URL: &str = "http://localhost:1234";

/// Maximum tokens for LLM completions.
pub const MAX_TOKENS: u64 = 4096;

/// Default context window size offered to providers that accept one.
pub const DEFAULT_CONTEXT_SIZE: usize = 16384;

/// Ratio of the context window at which compression triggers.
pub const COMPRESSION_TRIGGER_RATIO: f64 = 0.70;

/// Ratio of the context window compression must come back under.
pub const COMPRESSION_TARGET_RATIO: f64 = 0.40;

/// Number of most-recent user+assistant pairs never compressed.
pub const PROTECTED_TAIL_PAIRS: usize = 5;

/// Token budget for a compressed user-message surrogate.
pub const SURROGATE_USER_TOKENS: usize = 50;

/// Token budget for a compressed assistant-message surrogate.
pub const SURROGATE_ASSISTANT_TOKENS: usize = 200;

/// Prefix marking a compressed surrogate's content.
pub const COMPRESSED_SENTINEL: &str = "\u{1f4ac} [Compressed] ";

/// Maximum streaming rounds following tool batches within one turn.
pub const MAX_ITERATIONS: usize = 25;

/// Maximum tool batches within one turn.
pub const MAX_TOOL_DEPTH: usize = 10;

/// Iteration cap for the compression agent.
pub const COMPRESSION_AGENT_MAX_ITERATIONS: usize = 15;

/// Sampling temperature for the compression agent.
pub const COMPRESSION_AGENT_TEMPERATURE: f64 = 0.7;

/// Capacity of the stream chunk pipe between worker and orchestrator.
pub const STREAM_PIPE_CAPACITY: usize = 64;

/// Maximum file size the read tool accepts, unless configured otherwise.
pub const MAX_READ_SIZE: u64 = 100 * 1024;

/// Bytes inspected for null bytes when detecting binary files.
pub const BINARY_DETECTION_BYTES: usize = 8192;

/// Cap on grep matches returned to the model.
pub const GREP_MAX_MATCHES: usize = 200;

/// Cap on glob results returned to the model.
pub const GLOB_MAX_RESULTS: usize = 500;

/// Default timeout for shell commands, in seconds.
pub const BASH_DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cap on shell command output, in bytes.
pub const BASH_MAX_OUTPUT_SIZE: usize = 64 * 1024;

/// Environment variables stripped from shell commands.
pub const BASH_STRIPPED_ENV_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "AWS_SECRET_ACCESS_KEY",
    "GITHUB_TOKEN",
];

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-project configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = "tether.toml";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "chat_history.txt";

/// Directory (under the config dir) scanned for agent definition files.
pub const AGENTS_DIRNAME: &str = "agents";

/// Default system prompt prepended to all conversations.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are tether, a helpful AI assistant in the terminal backed by a local model. \
Be concise. Use the provided tools when a task needs file access or search.";

/// System prompt for the built-in compression agent.
pub const COMPRESSION_AGENT_PROMPT: &str = "You compress older conversation messages to free \
context space. Call get_compression_metadata to see the candidates, then submit a short \
summary for each one with compress_conversation_segment (user or assistant messages) or \
compress_tool_result (tool messages). Keep decisions, file paths, and error details. Check \
progress with verify_compression_target and stop once the target is met.";

/// System prompt for the built-in file curator agent.
pub const FILE_CURATOR_PROMPT: &str = "You curate the files touched during this session. \
Read the files you are asked about, then produce a short structured report: purpose of each \
file, notable symbols, and anything that looks stale or inconsistent.";
