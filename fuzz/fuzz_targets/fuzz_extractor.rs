#![no_main]
use std::cell::RefCell;

use arbitrary::Arbitrary;
use birdstream::{ExtractorOptions, ValueExtractor};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::{Map, Value};

const HEADER: usize = 5; // 1 flag + 4-byte split seed

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

/// Keep-alive and separator bytes seen between values on the wire.
static SEPARATORS: &[&[u8]] = &[b" ", b"\t", b"\n", b"\r\n", b"\r\n\r\n", b""];

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

/// Mostly builds a stream of concatenated values; otherwise defers to
/// libFuzzer's byte mutations so malformed input is covered too.
fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if max_size < HEADER {
        return fuzzer_mutate(data, size, max_size);
    }
    if size < HEADER || seed % 4 != 0 {
        data[0] = with_rng(|rng| rng.next_u32() as u8);
        data[1..HEADER].copy_from_slice(&with_rng(|rng| rng.next_u32().to_le_bytes()));

        let mut len = HEADER;
        let target = size.clamp(HEADER + 1, max_size);
        while len < target {
            let written = append_separator(&mut data[len..max_size]);
            len += written;
            let written = append_value(&mut data[len..max_size]);
            len += written;
            if written == 0 {
                break;
            }
        }
        len
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

fn append_separator(buf: &mut [u8]) -> usize {
    let sep = with_rng(|rng| SEPARATORS[rng.random_range(0..SEPARATORS.len())]);
    let len = sep.len().min(buf.len());
    buf[..len].copy_from_slice(&sep[..len]);
    len
}

fn append_value(buf: &mut [u8]) -> usize {
    let seed_len = with_rng(|rng| rng.random_range(1..256));
    let bytes: Vec<u8> = with_rng(|rng| (0..seed_len).map(|_| rng.random::<u8>()).collect());
    let Ok(value) = ArbitraryValue::arbitrary(&mut arbitrary::Unstructured::new(&bytes)) else {
        return 0;
    };
    let Ok(serialized) = serde_json::to_vec(&value.0) else {
        return 0;
    };
    let len = serialized.len().min(buf.len());
    buf[..len].copy_from_slice(&serialized[..len]);
    len
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug)]
struct ArbitraryValue(Value);

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let value = match u.choose_index(16)? {
            0 => Value::Null,
            1 => Value::Bool(u.arbitrary()?),
            2 => Value::from(u.arbitrary::<i64>()?),
            3 => {
                let n: f64 = u.arbitrary()?;
                Value::Number(serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?)
            }
            4..=8 => Value::String(u.arbitrary()?),
            9..=12 => {
                let items: Vec<ArbitraryValue> = u.arbitrary()?;
                Value::Array(items.into_iter().map(|v| v.0).collect())
            }
            _ => {
                let members: Vec<(String, ArbitraryValue)> = u.arbitrary()?;
                Value::Object(Map::from_iter(members.into_iter().map(|(k, v)| (k, v.0))))
            }
        };
        Ok(ArbitraryValue(value))
    }
}

/// Cuts `payload` into fragments at byte positions derived from `seed`,
/// ignoring UTF-8 boundaries.
fn split(payload: &[u8], seed: u64) -> Vec<&[u8]> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut out = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let at = rng.random_range(0..=rest.len());
        let (head, tail) = rest.split_at(at);
        out.push(head);
        rest = tail;
    }
    out
}

/// Feeds the fragments, returning the values and whether the input was
/// accepted.
fn run(fragments: &[&[u8]], options: ExtractorOptions) -> (Vec<Value>, bool) {
    let mut extractor: ValueExtractor = ValueExtractor::new(options);
    let mut values = Vec::new();
    for fragment in fragments {
        if extractor.feed_into(fragment, &mut values).is_err() {
            return (values, false);
        }
    }
    match extractor.finish() {
        Ok(rest) => {
            values.extend(rest);
            (values, true)
        }
        Err(_) => (values, false),
    }
}

fn check(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }
    let flags = data[0];
    let seed = u64::from(u32::from_le_bytes([data[1], data[2], data[3], data[4]]));
    let payload = &data[HEADER..];

    let options = ExtractorOptions {
        max_depth: if flags & 1 != 0 { 8 } else { 128 },
        max_value_bytes: (flags & 2 != 0).then_some(64),
    };

    let (whole, whole_ok) = run(&[payload], options);
    let (pieces, pieces_ok) = run(&split(payload, seed), options);

    // Fragment boundaries must never change the outcome.
    assert_eq!(whole_ok, pieces_ok);
    assert_eq!(whole, pieces);
}

fuzz_target!(|data: &[u8]| check(data));
