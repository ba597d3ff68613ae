//! Merging the durable item list with the live streaming overlay
//!
//! The durable source owns conversation structure; the tracker owns
//! freshness. Known items keep the durable list's order and are enriched
//! with live-computed fields; items the durable snapshot has not caught up
//! with yet are appended at the end in arrival order.

use std::collections::HashSet;

use braid_events::{ConversationItem, ItemPayload};

use crate::tracker::ItemTracker;

/// Combine durable items with the tracker's live overlay into one
/// deduplicated, ordered conversation.
///
/// With an empty tracker the output is the durable list unchanged.
pub fn merge(durable: &[ConversationItem], tracker: &ItemTracker) -> Vec<ConversationItem> {
    let mut merged = Vec::with_capacity(durable.len() + tracker.len());
    for item in durable {
        match tracker.get(&item.id) {
            Some(live) => merged.push(overlay(item, live)),
            None => merged.push(item.clone()),
        }
    }

    let known: HashSet<&str> = durable.iter().map(|i| i.id.as_str()).collect();
    for live in tracker.items() {
        if !known.contains(live.id.as_str()) {
            merged.push(live.clone());
        }
    }
    merged
}

/// Overlay live-computed fields onto a durable item without replacing its
/// identity: non-empty live content wins, live streaming/timing metadata
/// wins when present, and a terminal live status (with its error detail)
/// wins. This lets duration and streaming state computed live enrich an
/// item the durable snapshot already returned in completed form.
pub fn overlay(durable: &ConversationItem, live: &ConversationItem) -> ConversationItem {
    let mut merged = durable.clone();

    match (&mut merged.payload, &live.payload) {
        (
            ItemPayload::Message { segments, .. },
            ItemPayload::Message {
                segments: live_segments,
                ..
            },
        ) if !live_segments.is_empty() => {
            *segments = live_segments.clone();
        }
        (
            ItemPayload::Reasoning { summary },
            ItemPayload::Reasoning {
                summary: live_summary,
            },
        ) if !live_summary.is_empty() => {
            *summary = live_summary.clone();
        }
        (
            ItemPayload::ToolCall {
                name,
                arguments,
                output,
            },
            ItemPayload::ToolCall {
                name: live_name,
                arguments: live_arguments,
                output: live_output,
            },
        ) => {
            if live_name.is_some() {
                *name = live_name.clone();
            }
            if live_arguments.is_some() {
                *arguments = live_arguments.clone();
            }
            if live_output.is_some() {
                *output = live_output.clone();
            }
        }
        (ItemPayload::ToolList { tools }, ItemPayload::ToolList { tools: live_tools })
            if !live_tools.is_empty() =>
        {
            *tools = live_tools.clone();
        }
        (ItemPayload::WebSearch { query }, ItemPayload::WebSearch { query: live_query })
            if live_query.is_some() =>
        {
            *query = live_query.clone();
        }
        _ => {}
    }

    merged.is_streaming = live.is_streaming;
    if merged.timestamp.is_none() {
        merged.timestamp = live.timestamp.clone();
    }
    if live.started_at.is_some() {
        merged.started_at = live.started_at.clone();
    }
    if live.ended_at.is_some() {
        merged.ended_at = live.ended_at.clone();
    }
    if live.duration_seconds.is_some() {
        merged.duration_seconds = live.duration_seconds;
    }
    if live.status.is_terminal() {
        merged.status = live.status;
    }
    if live.error.is_some() {
        merged.error = live.error.clone();
    }
    if live.source_event.is_some() {
        merged.source_event = live.source_event.clone();
    }
    merged
}
