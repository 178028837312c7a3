#![no_main]

use arbitrary::Arbitrary;
use esl_image::{render_rgb, ColorTable, DisplayDescriptor, Rgb, Rotation};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    bpp: u8,
    rotation: u8,
    colors: Vec<[u8; 3]>,
    bitmap: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(rotation) = Rotation::try_from(input.rotation % 4) else {
        return;
    };
    let table: ColorTable = input
        .colors
        .iter()
        .take(16)
        .enumerate()
        .map(|(i, c)| (format!("c{i}"), Rgb::from(*c)))
        .collect();

    let display = DisplayDescriptor::new(
        (input.width as usize).max(1),
        (input.height as usize).max(1),
        input.bpp % 9,
    )
    .with_rotation(rotation)
    .with_color_table(table);

    // Invalid depths are rejected; anything else must render without panicking
    if let Ok(img) = render_rgb(&input.bitmap, &display) {
        assert_eq!(img.width() as usize, display.width);
        assert_eq!(img.height() as usize, display.height);
    }
});
