use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docseq_core::sequence::{SequenceDecoder, SequenceEncoder, Vocabulary};
use docseq_core::types::Label;

fn bench_encode(c: &mut Criterion) {
    let labels: Vec<Label> = [
        r#"{"table": {"header": ["name", "qty", "price"], "row": [{"cell": ["apple", "3", "1.20"]}, {"cell": ["pear", "1", "0.80"]}]}}"#,
        r#"{"text_sequence": "\\begin{tabular}{cc} a & b \\\\ c & d \\end{tabular}"}"#,
        r#"{"menu": [{"nm": "latte", "price": 4.5, "cnt": 2}, {"nm": "bagel", "price": 3, "cnt": 1}], "total": {"total_price": 12}}"#,
    ]
    .iter()
    .map(|json| Label::from_json_str(json).unwrap())
    .collect();

    let encoder = SequenceEncoder::default();

    c.bench_function("encode_table", |b| {
        let mut vocab = Vocabulary::new();
        b.iter(|| encoder.encode(black_box(&labels[0]), &mut vocab));
    });

    c.bench_function("encode_batch_3", |b| {
        let mut vocab = Vocabulary::new();
        b.iter(|| {
            for label in &labels {
                let _ = encoder.encode(black_box(label), &mut vocab);
            }
        });
    });

    let mut vocab = Vocabulary::new();
    let encoded = encoder.encode(&labels[2], &mut vocab);
    let decoder = SequenceDecoder::new().unwrap();
    c.bench_function("decode_receipt", |b| {
        b.iter(|| decoder.decode(black_box(&encoded), &vocab).unwrap());
    });
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);
