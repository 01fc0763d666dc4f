//! Translation between the OpenAI wire format and watsonx.ai.
//!
//! Requests, buffered responses and chat streams are converted here. Every
//! function in this module is pure; HTTP lives in [`crate::upstream`].

pub mod openai_types;
pub mod params;
pub mod request;
pub mod response;
pub mod streaming;
pub mod watsonx_types;
