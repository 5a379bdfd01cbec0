//! Service modules for photo evaluation
//!
//! Leaves first: response parsing, image preparation, the model client,
//! directory scanning and the batch evaluator that ties them together.

pub mod batch_evaluator;
pub mod file_scanner;
pub mod image_encoder;
pub mod ollama_client;
pub mod response_parser;

pub use batch_evaluator::{BatchEvaluator, DEFAULT_MAX_CONCURRENT};
pub use file_scanner::{FileScanner, ScanError};
pub use image_encoder::{encode_image_for_upload, ImageEncodeError};
pub use ollama_client::{EvaluationError, OllamaClient, EVALUATION_PROMPT};
pub use response_parser::{evaluation_from_text, extract_result, ParsedEvaluation};
