mod llm_transport;
mod memoized;
