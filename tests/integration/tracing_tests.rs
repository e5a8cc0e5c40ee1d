//! Bridging records and spans into a `tracing` subscriber.

use std::io::{self, Write};
use std::sync::Arc;

use o11y::observer;
use o11y::sink::TracingSink;
use o11y::tracing_support::{BasicTracer, SpanKind, Tracer, TracingExporter};
use o11y::{fields, Context, Level, ObserverConfig, ObserverSetup};
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_records_and_spans_reach_subscriber() -> anyhow::Result<()> {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    tracing::subscriber::with_default(subscriber, || -> anyhow::Result<()> {
        let sink = Arc::new(TracingSink::new(Level::Debug));
        let tracer: Arc<dyn Tracer> =
            Arc::new(BasicTracer::new(Arc::new(TracingExporter::new("checkout-svc"))));
        let setup = ObserverSetup::builder()
            .config(Arc::new(ObserverConfig::builder().level(Level::Debug).build()))
            .out(sink.clone())
            .err(sink)
            .tracer(Arc::clone(&tracer))
            .install_global(false)
            .build();

        let (cx, obs) = observer::initialise(&Context::new(), setup)?;
        obs.develop("below the sink level", fields![]);
        let (cx, obs) = observer::span(&cx, tracer.as_ref(), "reserve stock", SpanKind::Internal)?;
        obs.info("order placed", fields!["order_id" => "ord_9"]);
        observer::end(&cx)?;
        obs.try_close()?;
        Ok(())
    })?;

    let text = captured.text();
    assert!(text.contains("observer initialised"));
    assert!(text.contains("order placed"));
    assert!(text.contains("ord_9"));
    assert!(!text.contains("below the sink level"));
    assert!(text.contains("span finished"));
    assert!(text.contains("checkout-svc"));
    Ok(())
}
