use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fsh_parser::{FshParser, lexer};
use std::hint::black_box;

// Sample FSH content for synthetic benchmarks
const SIMPLE_PROFILE: &str = r#"Profile: SimplePatient
Parent: Patient
Description: "A simple patient profile for benchmarking"
* name 1..1 MS
* birthDate 0..1
"#;

const COMPLEX_PROFILE: &str = r#"Profile: ComplexPatient
Parent: Patient
Id: complex-patient
Title: "Complex Patient Profile"
Description: """
A more complex patient profile
with multiple constraints
"""
* ^status = #active
* name 1..* MS
  * given 1..* MS
  * family 1..1 MS
* identifier contains
    mrn 1..1 MS and
    ssn 0..1
* gender from http://hl7.org/fhir/ValueSet/administrative-gender (required)
* generalPractitioner only Reference(Practitioner or PractitionerRole)
* extension[birthWeight].valueQuantity = 3.5 'kg'
* obeys pat-1 and pat-2
* insert CommonRules(patient, [[a, b]])
"#;

const CODE_SYSTEM: &str = r#"CodeSystem: Colors
Id: colors
* #red "Red" "The color red"
  * #crimson "Crimson"
  * #scarlet "Scarlet"
* #blue "Blue"
  * #navy "Navy"
* #red ^designation[0].value = "rouge"
"#;

/// Benchmark parsing different FSH constructs
fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    let parser = FshParser::new();

    for (name, source) in [
        ("simple_profile", SIMPLE_PROFILE),
        ("complex_profile", COMPLEX_PROFILE),
        ("code_system", CODE_SYSTEM),
    ] {
        group.bench_function(name, |b| b.iter(|| black_box(parser.parse(black_box(source)))));
    }

    group.finish();
}

fn bench_lexer(c: &mut Criterion) {
    c.bench_function("lexer/complex_profile", |b| {
        b.iter(|| black_box(lexer::lex(black_box(COMPLEX_PROFILE))))
    });
}

/// Benchmark parsing large generated files
fn bench_large_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_files");
    let parser = FshParser::new();

    for &size in &[10, 100, 500] {
        let mut content = String::new();
        for i in 0..size {
            content.push_str(&format!(
                r#"
Profile: TestProfile{i}
Parent: Patient
Description: "Test profile number {i}"
* name 1..1 MS
* identifier 1..* MS
* status = #active "Active"

"#
            ));
        }

        group.throughput(Throughput::Bytes(content.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &content, |b, content| {
            b.iter(|| black_box(parser.parse(content)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parser, bench_lexer, bench_large_files);
criterion_main!(benches);
