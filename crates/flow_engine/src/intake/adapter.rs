use sha2::{Digest, Sha256};

use super::types::{ChatMessage, Fragment, InboundEvent, InboundFragment, Rank, StreamId};

/// Turns a raw bridge record into a canonical message.
///
/// Returns `None` when there is nothing to render: no stream id, or no
/// surviving fragments and no fallback text.
pub fn normalize_event(event: &InboundEvent) -> Option<ChatMessage> {
    let stream_id = event.stream_id.trim();
    if stream_id.is_empty() {
        return None;
    }

    let mut fragments = event
        .fragments
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(normalize_fragment)
        .collect::<Vec<_>>();

    if fragments.is_empty() {
        let fallback = event.message.as_deref().map(str::trim).unwrap_or_default();
        if fallback.is_empty() {
            return None;
        }
        fragments.push(Fragment::Text(fallback.to_string()));
    }

    let stream_id = StreamId::new(stream_id);
    let author = non_blank(event.author.as_deref());
    let id = match non_blank(event.id.as_deref()) {
        Some(id) => id,
        None => derive_message_id(&stream_id, author.as_deref(), &fragments),
    };

    Some(ChatMessage {
        id,
        stream_id,
        author,
        rank: event
            .rank
            .as_deref()
            .map(Rank::parse_lenient)
            .unwrap_or_default(),
        fragments,
        avatar_ref: non_blank(event.avatar_ref.as_deref()),
    })
}

/// Stable id for records that arrive without one.
pub fn derive_message_id(
    stream_id: &StreamId,
    author: Option<&str>,
    fragments: &[Fragment],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stream_id.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(author.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => {
                hasher.update([b't']);
                hasher.update(text.as_bytes());
            }
            Fragment::Image { src, alt } => {
                hasher.update([b'i']);
                hasher.update(src.as_bytes());
                hasher.update([0u8]);
                hasher.update(alt.as_bytes());
            }
        }
        hasher.update([0u8]);
    }

    to_hex_lower(&hasher.finalize())
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

fn normalize_fragment(fragment: &InboundFragment) -> Option<Fragment> {
    match fragment {
        InboundFragment::Text { content } => {
            let text = content.trim();
            (!text.is_empty()).then(|| Fragment::Text(text.to_string()))
        }
        InboundFragment::Image { src, alt } => {
            let src = src.trim();
            (!src.is_empty()).then(|| Fragment::Image {
                src: src.to_string(),
                alt: alt.trim().to_string(),
            })
        }
        InboundFragment::Unsupported => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}
