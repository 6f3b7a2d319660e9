//! Fuzz target for CSV parsing and record conversion.
//!
//! This fuzzer feeds arbitrary byte sequences through Latin-1 and UTF-8
//! decoding, the CSV parser and the row converter, checking for panics,
//! crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mpdata::convert::CsvRecordConverter;
use mpdata::tabular::{fuzz_read_table_bytes, TextEncoding};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    for encoding in [TextEncoding::Latin1, TextEncoding::Utf8] {
        if let Ok(table) = fuzz_read_table_bytes(data, encoding) {
            let _ = CsvRecordConverter::new(encoding).convert_table(&table);
        }
    }
});
