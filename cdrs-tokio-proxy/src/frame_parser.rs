use std::io::Cursor;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use cassandra_proxy_protocol::compression::Compression;
use cassandra_proxy_protocol::error;
use cassandra_proxy_protocol::frame::{
    Direction, Flags, Frame, Opcode, Version, LENGTH_LEN, STREAM_LEN,
};
use cassandra_proxy_protocol::types::{from_cursor_bytes_map, from_cursor_string_list, UUID_LEN};

/// Reads a single frame, in either direction. Bodies flagged as compressed are decoded with
/// `compressor`; tracing ids are only present in responses.
pub async fn parse_frame<T: AsyncReadExt + Unpin>(
    cursor: &mut T,
    compressor: Compression,
) -> error::Result<Frame> {
    let mut version_bytes = [0; Version::BYTE_LENGTH];
    let mut flag_bytes = [0; Flags::BYTE_LENGTH];
    let mut opcode_bytes = [0; Opcode::BYTE_LENGTH];
    let mut stream_bytes = [0; STREAM_LEN];
    let mut length_bytes = [0; LENGTH_LEN];

    // NOTE: order of reads matters
    cursor.read_exact(&mut version_bytes).await?;
    cursor.read_exact(&mut flag_bytes).await?;
    cursor.read_exact(&mut stream_bytes).await?;
    cursor.read_exact(&mut opcode_bytes).await?;
    cursor.read_exact(&mut length_bytes).await?;

    let version = Version::try_from(version_bytes[0])?;
    let direction = Direction::from(version_bytes[0]);
    let flags = Flags::from_bits_truncate(flag_bytes[0]);
    let stream = i16::from_be_bytes(stream_bytes);
    let opcode = Opcode::try_from(opcode_bytes[0])?;
    let length = i32::from_be_bytes(length_bytes);

    let length = usize::try_from(length)
        .map_err(|_| error::Error::General(format!("Invalid frame body length: {length}")))?;

    let mut body_bytes = vec![0; length];

    cursor.read_exact(&mut body_bytes).await?;

    let full_body = if flags.contains(Flags::COMPRESSION) {
        compressor.decode(body_bytes)?
    } else {
        body_bytes
    };

    // Use cursor to get tracing id, warnings, custom payload and actual body
    let mut body_cursor = Cursor::new(full_body.as_slice());

    let tracing_id = if direction == Direction::Response && flags.contains(Flags::TRACING) {
        let mut tracing_bytes = [0; UUID_LEN];
        std::io::Read::read_exact(&mut body_cursor, &mut tracing_bytes)?;

        Some(Uuid::from_bytes(tracing_bytes))
    } else {
        None
    };

    let warnings = if flags.contains(Flags::WARNING) {
        from_cursor_string_list(&mut body_cursor)?
    } else {
        vec![]
    };

    let custom_payload = if flags.contains(Flags::CUSTOM_PAYLOAD) {
        Some(from_cursor_bytes_map(&mut body_cursor)?)
    } else {
        None
    };

    let mut body = vec![];

    std::io::Read::read_to_end(&mut body_cursor, &mut body)?;

    Ok(Frame {
        version,
        direction,
        flags,
        opcode,
        stream,
        body,
        tracing_id,
        warnings,
        custom_payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[tokio::test]
    async fn should_read_compressed_request_with_custom_payload() {
        let custom_payload = hashmap! { "routing_key".to_string() => b"pk".to_vec() };

        let body = vec![0, 0, 0, 1, b'x'];
        let frame = Frame::new_request(Version::V4, Flags::empty(), Opcode::Prepare, body)
            .with_custom_payload(custom_payload.clone());
        let encoded = frame.encode_with(Compression::Snappy).unwrap();

        let parsed = parse_frame(&mut encoded.as_slice(), Compression::Snappy)
            .await
            .unwrap();

        assert_eq!(parsed.direction, Direction::Request);
        assert_eq!(parsed.stream, frame.stream);
        assert_eq!(parsed.custom_payload, Some(custom_payload));
        assert_eq!(parsed.body, frame.body);
    }

    #[tokio::test]
    async fn should_read_tracing_id_and_warnings_of_response() {
        let tracing_id = [7u8; UUID_LEN];
        let mut body = tracing_id.to_vec();
        body.extend_from_slice(&[0, 1, 0, 4, b'w', b'a', b'r', b'n']);
        body.extend_from_slice(&[0, 0, 0, 1]);

        let mut bytes = vec![0x84, 0x0a, 0x00, 0x05, 0x08];
        bytes.extend_from_slice(&(body.len() as i32).to_be_bytes());
        bytes.extend_from_slice(&body);

        let parsed = parse_frame(&mut bytes.as_slice(), Compression::None)
            .await
            .unwrap();

        assert_eq!(parsed.tracing_id, Some(Uuid::from_bytes(tracing_id)));
        assert_eq!(parsed.warnings, vec!["warn".to_string()]);
        assert_eq!(parsed.opcode, Opcode::Result);
        assert_eq!(parsed.body, vec![0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn should_fail_on_truncated_frame() {
        let bytes = [0x84u8, 0x00, 0x00, 0x01, 0x02, 0, 0, 0, 4, 0];
        assert!(parse_frame(&mut &bytes[..], Compression::None).await.is_err());
    }
}
