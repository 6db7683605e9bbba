use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tks_core::{Command, Projector, ScriptParser, Tokenizer};
use tks_lang::{Keyword, LanguageConfig};

fn large_script(command_count: usize) -> String {
    let mut out = String::with_capacity(command_count * 40);
    out.push_str("用例: bench\n脚本名: performance\n步骤:\n");
    for i in 0..command_count {
        let line = match i % 4 {
            0 => format!("    点击 [{{{},{}}}]\n", i % 1080, i % 1920),
            1 => format!("    输入 [{{输入框}}&resourceId, 文本{i}]\n"),
            2 => "    # comment\n".to_string(),
            _ => format!("    滑动 [{{100,{i}}}, {{200,400}}, 1000]\n"),
        };
        out.push_str(&line);
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let cfg = LanguageConfig::tks();
    let text = large_script(10_000);
    c.bench_function("parse/10k_lines", |b| {
        b.iter(|| black_box(ScriptParser::new(&cfg).parse(black_box(&text)).len()))
    });
}

fn bench_tokenize(c: &mut Criterion) {
    let cfg = LanguageConfig::tks();
    let text = large_script(10_000);
    c.bench_function("tokenize/10k_lines", |b| {
        b.iter(|| black_box(Tokenizer::new(&cfg).tokenize(black_box(&text)).len()))
    });
}

fn bench_block_edits(c: &mut Criterion) {
    let cfg = LanguageConfig::tks();
    let text = large_script(10_000);
    let projector = Projector::new(&cfg);
    let wait = Command::from_raw(Keyword::Wait, ["500"]);
    c.bench_function("insert_middle/10k_lines", |b| {
        b.iter(|| {
            let count = projector.count(&text);
            black_box(projector.insert(&text, &wait, count / 2).map(|t| t.len()))
        })
    });
    c.bench_function("reorder_first_to_middle/10k_lines", |b| {
        b.iter(|| black_box(projector.reorder(&text, 0, 5_000).map(|t| t.len())))
    });
}

criterion_group!(benches, bench_parse, bench_tokenize, bench_block_edits);
criterion_main!(benches);
