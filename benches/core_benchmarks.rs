use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use roomcast::common::codec::LineCodec;
use roomcast::control::{respond, RequestHandler};
use roomcast::jsonrpc::{Request, RequestFault};
use roomcast::stream::librespot::LibrespotAdapter;
use roomcast::stream::{SourceAdapter, StreamUri};
use serde_json::{json, Value};
use tokio_util::codec::Decoder;

struct Mixer;

impl RequestHandler for Mixer {
    fn handle(&mut self, request: &Request) -> Result<Value, RequestFault> {
        let volume: i64 = request.param_in_range("volume", 0, 100)?;
        Ok(json!({ "volume": volume }))
    }
}

fn bench_request_parse(c: &mut Criterion) {
    let raw = r#"{"jsonrpc":"2.0","id":7,"method":"Stream.GetStatus","params":{"id":"Spotify"}}"#;
    c.bench_function("request_parse", |b| {
        b.iter(|| {
            let _ = Request::parse(black_box(raw));
        })
    });
}

fn bench_respond(c: &mut Criterion) {
    let raw = r#"{"jsonrpc":"2.0","id":5,"method":"Do","params":{"volume":250}}"#;
    let mut mixer = Mixer;
    c.bench_function("respond_out_of_range", |b| {
        b.iter(|| {
            let _ = respond(&mut mixer, black_box(raw));
        })
    });
}

fn bench_line_codec(c: &mut Criterion) {
    let mut codec = LineCodec::new(8 * 1024);
    let data = b"[2026-01-01T00:00:00Z INFO  librespot_playback::player] <Heroes> (371000 ms) loaded\n";
    c.bench_function("line_codec_decode", |b| {
        b.iter(|| {
            let mut src = BytesMut::from(&data[..]);
            let _ = codec.decode(black_box(&mut src));
        })
    });
}

fn bench_stderr_classification(c: &mut Criterion) {
    let uri = StreamUri::parse("spotify:///librespot?name=Spotify").unwrap();
    let mut adapter = LibrespotAdapter::from_uri(&uri).unwrap();
    c.bench_function("librespot_stderr_line", |b| {
        b.iter(|| {
            let _ = adapter.on_stderr_line(black_box("Track \"Heroes\" loaded"));
        })
    });
}

criterion_group!(
    benches,
    bench_request_parse,
    bench_respond,
    bench_line_codec,
    bench_stderr_classification
);
criterion_main!(benches);
