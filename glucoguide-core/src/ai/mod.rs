//! AI-backed endpoints: wire contracts, model output parsing and the client
//! used to reach the proxy server.

mod client;
mod contracts;
mod extract;

pub use client::AiClient;
pub use contracts::{
    blog_prompt, gi_prompt, parse_blog_response, parse_gi_response, validate_gi_result,
    BlogContent, BlogContentRequest, BlogParseError, GiEstimate, GiParseError, GiRequest,
    GiResponse, NewsFeed, NewsItem, GI_KEYS,
};
pub use extract::{extract_json, snippet, strip_fences};
