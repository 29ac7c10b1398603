use std::sync::Arc;

use redline_engine::http::{HttpSourceConfig, HttpSuggestionSource};
use redline_engine::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), EngineError> {
    redline_engine::init_observability();

    let config = HttpSourceConfig::from_env()?;
    let engine = SuggestEngine::builder()
        .register_source(Arc::new(HttpSuggestionSource::new(
            "risk",
            "/api/analysis/risks/stream",
            config,
        )?))
        .build()?;

    let document = "Payment is due within 30 days of invoice. \
                    Either party may terminate with 15 days notice.";

    let session = engine
        .session(SessionConfig::named("risk-review"))
        .source("risk")
        .request(AnalysisRequest::new(document))
        .on_progress(|changed, snapshot| {
            println!(
                "[{} of {}] {:?}: {} -> {}",
                changed.order + 1,
                snapshot.len(),
                changed.kind,
                changed.original,
                changed.replacement
            );
        })
        .on_complete(|summary| println!("analysis complete: {}", summary.message))
        .on_error(|failure| eprintln!("stream failed: {failure}"))
        .open()?;

    session.finished().await;
    println!("final state: {:?}", session.state());
    Ok(())
}
