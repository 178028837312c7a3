use esl_image::*;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use std::io::Write;

fn mono(width: usize, height: usize) -> DisplayDescriptor {
    DisplayDescriptor::new(width, height, 1)
        .with_name("test")
        .with_color_table(ColorTable::black_white())
}

fn bwr(width: usize, height: usize) -> DisplayDescriptor {
    let mut table = ColorTable::black_white();
    table.insert("red", Rgb::new(255, 0, 0));
    DisplayDescriptor::new(width, height, 2).with_color_table(table)
}

fn header(start_row: u16, row_count: u16, format: u8, flags: u8) -> Vec<u8> {
    BlockHeader {
        start_row,
        row_count,
        format,
        flags,
    }
    .to_bytes()
    .to_vec()
}

fn raw_block(start_row: u16, row_count: u16, flags: u8, rows: &[u8]) -> Vec<u8> {
    let mut payload = header(start_row, row_count, 0, flags);
    payload.extend_from_slice(rows);
    payload
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = (payload.len() as u32).to_le_bytes().to_vec();
    out.extend_from_slice(payload);
    out
}

fn zlib(payload: &[u8], level: Compression) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_uncompressed_block_header_removed() {
    let plane = [0xAAu8; 8];
    let stream = frame(&raw_block(0, 8, 0, &plane));

    let result = decode_raw(&stream, &mono(8, 8)).expect("decode should succeed");
    assert_eq!(result, plane.to_vec());
}

#[test]
fn test_zero_length_prefix_reads_nothing() {
    // A zero-length block followed by bytes that never get framed as a payload
    let mut stream = 0u32.to_le_bytes().to_vec();
    stream.extend_from_slice(&[0u8; 6]);
    stream.extend_from_slice(&[0xAA; 8]);

    let (result, stats) = decode_raw_with_stats(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result.len(), 8);
    assert_eq!(stats.applied, 0);
}

#[test]
fn test_zlib_block_matches_raw() {
    let plane = [0xAAu8; 8];
    let payload = raw_block(0, 8, 0, &plane);

    for level in [Compression::fast(), Compression::default(), Compression::best()] {
        let compressed = zlib(&payload, level);
        assert_eq!(compressed[0], 0x78);

        let (result, stats) = decode_raw_with_stats(&frame(&compressed), &mono(8, 8)).unwrap();
        assert_eq!(result, plane.to_vec());
        assert_eq!(stats.applied, 1);
    }
}

#[test]
fn test_g5_literal_block_matches_raw() {
    let plane = [0xAAu8; 8];
    let mut payload = header(0, 8, 1, 0);
    payload.push(0x07); // literal of 8 bytes
    payload.extend_from_slice(&plane);

    let result = decode_raw(&frame(&payload), &mono(8, 8)).unwrap();
    assert_eq!(result, plane.to_vec());
}

#[test]
fn test_g5_run_block_matches_raw() {
    let mut payload = header(0, 8, 1, 0);
    payload.extend_from_slice(&[0xC3, 0x83]); // 4 x 0xFF, 4 x 0x00

    let result = decode_raw(&frame(&payload), &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
}

#[test]
fn test_g5_mixed_commands() {
    let mut payload = header(0, 8, 1, 0);
    payload.extend_from_slice(&[0xC1, 0x02, 0x11, 0x22, 0x33, 0x82]);

    let result = decode_raw(&frame(&payload), &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0xFF, 0xFF, 0x11, 0x22, 0x33, 0, 0, 0]);
}

#[test]
fn test_g5_block_reported_as_g5() {
    let mut payload = header(0, 2, 1, 0);
    payload.extend_from_slice(&[0xC1]);
    let stream = frame(&payload);

    let blocks: Vec<_> = Blocks::new(&stream, 1).collect::<Result<_>>().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].codec, Codec::G5);
    assert_eq!(blocks[0].rows(), &[0xFF, 0xFF]);
    assert_eq!(blocks[0].payload_len, 7);
}

#[test]
fn test_two_bpp_planes_concatenated() {
    let mut stream = frame(&raw_block(0, 8, 0, &[0x00; 8]));
    stream.extend(frame(&raw_block(0, 8, 1, &[0xFF; 8])));

    let result = decode_raw(&stream, &bwr(8, 8)).unwrap();
    let mut expected = vec![0x00u8; 8];
    expected.extend_from_slice(&[0xFF; 8]);
    assert_eq!(result, expected);
}

#[test]
fn test_two_bpp_plane_from_low_flag_bit_only() {
    // 0x03 still selects plane 1; the upper flag bits are ignored
    let stream = frame(&raw_block(0, 8, 0x03, &[0x5A; 8]));

    let result = decode_raw(&stream, &bwr(8, 8)).unwrap();
    assert_eq!(&result[..8], &[0u8; 8]);
    assert_eq!(&result[8..], &[0x5A; 8]);
}

#[test]
fn test_one_bpp_ignores_plane_flag() {
    let stream = frame(&raw_block(0, 8, 1, &[0x11; 8]));

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0x11; 8]);
}

#[test]
fn test_partial_update_touches_only_its_rows() {
    let stream = frame(&raw_block(2, 3, 0, &[0x01, 0x02, 0x03]));

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0, 0, 0x01, 0x02, 0x03, 0, 0, 0]);
}

#[test]
fn test_later_blocks_overwrite_earlier() {
    let mut stream = frame(&raw_block(0, 8, 0, &[0xFF; 8]));
    stream.extend(frame(&raw_block(3, 2, 0, &[0x00, 0x00])));

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0xFF, 0xFF, 0xFF, 0, 0, 0xFF, 0xFF, 0xFF]);
}

#[test]
fn test_out_of_order_blocks() {
    let mut stream = frame(&raw_block(4, 4, 0, &[0x44; 4]));
    stream.extend(frame(&raw_block(0, 4, 0, &[0x11; 4])));

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0x11, 0x11, 0x11, 0x11, 0x44, 0x44, 0x44, 0x44]);
}

#[test]
fn test_truncated_length_is_clamped() {
    let payload = raw_block(0, 8, 0, &[0xAA; 8]);
    let mut stream = 1000u32.to_le_bytes().to_vec();
    stream.extend_from_slice(&payload);

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0xAA; 8]);
}

#[test]
fn test_truncated_rows_are_clamped() {
    // Header promises 8 rows but only 3 bytes follow
    let stream = frame(&raw_block(0, 8, 0, &[0x01, 0x02, 0x03]));

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0x01, 0x02, 0x03, 0, 0, 0, 0, 0]);
}

#[test]
fn test_rows_past_height_are_clamped() {
    let stream = frame(&raw_block(6, 4, 0, &[0x66, 0x77, 0x88, 0x99]));

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0, 0, 0, 0, 0, 0, 0x66, 0x77]);
}

#[test]
fn test_block_starting_past_height_is_skipped() {
    let stream = frame(&raw_block(20, 2, 0, &[0xFF, 0xFF]));

    let (result, stats) = decode_raw_with_stats(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0u8; 8]);
    assert_eq!(
        stats,
        AssemblyStats {
            applied: 0,
            skipped: 1,
            failed: 0
        }
    );
}

#[test]
fn test_short_block_is_skipped() {
    let mut stream = frame(&[0x01, 0x02, 0x03]);
    stream.extend(frame(&raw_block(0, 1, 0, &[0xEE])));

    let (result, stats) = decode_raw_with_stats(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0xEE, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(stats.applied, 1);
}

#[test]
fn test_short_block_after_inflate_is_skipped() {
    let compressed = zlib(&[0x00, 0x01], Compression::default());
    let mut stream = frame(&compressed);
    stream.extend(frame(&raw_block(1, 1, 0, &[0xEE])));

    let blocks: Vec<_> = Blocks::new(&stream, 1).collect::<Result<_>>().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].index, 1);
}

#[test]
fn test_inflate_failure_does_not_stop_decoding() {
    let mut stream = frame(&[0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    stream.extend(frame(&raw_block(0, 8, 0, &[0x3C; 8])));

    let blocks: Vec<_> = Blocks::new(&stream, 1).collect();
    assert_eq!(blocks.len(), 2);
    assert!(matches!(blocks[0], Err(EslError::Inflate { block: 0, .. })));
    assert!(blocks[1].is_ok());

    let (result, stats) = decode_raw_with_stats(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0x3C; 8]);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.applied, 1);
}

#[test]
fn test_trailing_bytes_without_prefix_ignored() {
    let mut stream = frame(&raw_block(0, 8, 0, &[0x0F; 8]));
    stream.extend_from_slice(&[0xFF, 0xFF, 0xFF]);

    let result = decode_raw(&stream, &mono(8, 8)).unwrap();
    assert_eq!(result, vec![0x0F; 8]);
}

#[test]
fn test_empty_stream_yields_blank_frame() {
    let result = decode_raw(&[], &bwr(16, 4)).unwrap();
    assert_eq!(result, vec![0u8; 2 * 4 * 2]);
}

#[test]
fn test_rotation_swaps_row_geometry() {
    // 16 wide, 8 tall, rotated 90: rows are 8 pixels (1 byte), 16 of them
    let display = mono(16, 8).with_rotation(Rotation::Rotate90);
    assert_eq!(display.effective_dimensions(), (8, 16));
    assert_eq!(display.bytes_per_row(), 1);

    let rows: Vec<u8> = (0..16).collect();
    let stream = frame(&raw_block(0, 16, 0, &rows));
    let result = decode_raw(&stream, &display).unwrap();
    assert_eq!(result, rows);
}

#[test]
fn test_packed_index_frame_layout() {
    // 5 pixels at 4 bpp round up to 3 bytes per row
    let display = DisplayDescriptor::new(5, 2, 4);
    assert_eq!(display.bytes_per_row(), 3);
    assert_eq!(display.frame_len(), 6);

    let stream = frame(&raw_block(1, 1, 1 << 1, &[0x12, 0x34, 0x50]));
    let result = decode_raw(&stream, &display).unwrap();
    assert_eq!(result, vec![0, 0, 0, 0x12, 0x34, 0x50]);
}

#[test]
fn test_one_bpp_odd_width_row_stride() {
    // 10 pixels round up to 2 bytes per row, so row 1 starts at byte 2
    let display = mono(10, 3);
    assert_eq!(display.bytes_per_row(), 2);

    let stream = frame(&raw_block(1, 1, 0, &[0xAB, 0xC0]));
    let result = decode_raw(&stream, &display).unwrap();
    assert_eq!(result, vec![0, 0, 0xAB, 0xC0, 0, 0]);
}

#[test]
fn test_two_bpp_odd_width_row_stride() {
    let display = bwr(10, 3);
    assert_eq!(display.plane_len(), 6);

    let mut stream = frame(&raw_block(1, 1, 0, &[0x12, 0x80]));
    stream.extend(frame(&raw_block(2, 1, 1, &[0x34, 0x40])));

    let result = decode_raw(&stream, &display).unwrap();
    assert_eq!(
        result,
        vec![0, 0, 0x12, 0x80, 0, 0, 0, 0, 0, 0, 0x34, 0x40]
    );
}

#[test]
fn test_g5_respects_row_width() {
    // 16 pixels wide: 2 bytes per row, 2 rows = 4 bytes, extra commands ignored
    let mut payload = header(0, 2, 1, 0);
    payload.extend_from_slice(&[0xCF, 0x8F]);

    let result = decode_raw(&frame(&payload), &mono(16, 4)).unwrap();
    assert_eq!(result, vec![0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
}

#[test]
fn test_invalid_descriptors_rejected() {
    assert!(matches!(
        decode_raw(&[], &mono(0, 8)),
        Err(EslError::InvalidDimensions { width: 0, height: 8 })
    ));
    assert!(matches!(
        decode_raw(&[], &DisplayDescriptor::new(8, 8, 0)),
        Err(EslError::UnsupportedBitsPerPixel(0))
    ));
    assert!(matches!(
        decode_raw(&[], &DisplayDescriptor::new(8, 8, 16)),
        Err(EslError::UnsupportedBitsPerPixel(16))
    ));
    assert!(matches!(
        decode_raw(&[], &mono(1 << 20, 1 << 20)),
        Err(EslError::FrameTooLarge { .. })
    ));
}

#[test]
fn test_rotation_codes() {
    assert_eq!(Rotation::try_from(0).unwrap(), Rotation::None);
    assert_eq!(Rotation::try_from(3).unwrap(), Rotation::Rotate270);
    assert_eq!(Rotation::Rotate180.code(), 2);
    assert!(matches!(
        Rotation::try_from(4),
        Err(EslError::InvalidRotation(4))
    ));
}

#[test]
fn test_assembler_applies_blocks_directly() {
    let display = bwr(8, 2);
    let mut assembler = FrameAssembler::new(&display).unwrap();
    let stream = frame(&raw_block(1, 1, 1, &[0x80]));

    for block in Blocks::new(&stream, display.bytes_per_row()) {
        assembler.apply(&block.unwrap());
    }
    assert_eq!(assembler.planes().len(), 2);
    assert_eq!(assembler.planes()[1], vec![0x00, 0x80]);
    assert_eq!(assembler.into_bitmap(), vec![0, 0, 0, 0x80]);
}

#[test]
fn test_header_roundtrip_bytes() {
    let header = BlockHeader {
        start_row: 0x0102,
        row_count: 0x0304,
        format: 1,
        flags: 0x80,
    };
    assert_eq!(header.to_bytes(), [0x02, 0x01, 0x04, 0x03, 0x01, 0x80]);
    assert_eq!(BlockHeader::parse(&header.to_bytes()), Some(header));
    assert_eq!(BlockHeader::parse(&[0; 5]), None);
    assert!(header.is_g5());
}
