#![no_main]

use esl_image::{decode_raw, ColorTable, DisplayDescriptor, Rotation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The decoder should never panic, regardless of input
    for bpp in [1, 2, 4] {
        let display = DisplayDescriptor::new(152, 152, bpp)
            .with_rotation(Rotation::Rotate90)
            .with_color_table(ColorTable::black_white());
        let _ = decode_raw(data, &display);
    }
});
