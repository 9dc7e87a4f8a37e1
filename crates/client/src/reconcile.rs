use pairchat_shared::constants::RECONCILE_WINDOW_MS;
use pairchat_shared::models::Message;

/// Finds the optimistic entry a confirmed message should replace.
///
/// A confirmed copy carrying a `clientMessageId` only ever matches the
/// temporary entry with the same id. Copies without one fall back to the
/// loose rule: same author, timestamps within the reconcile window, and an
/// equal body or equal attachment.
pub fn find_optimistic_match(messages: &[Message], confirmed: &Message) -> Option<usize> {
    let candidates = messages.iter().enumerate().filter(|(_, m)| m.is_temporary());

    if let Some(cid) = confirmed.client_message_id.as_deref() {
        return candidates
            .filter(|(_, m)| m.client_message_id.as_deref() == Some(cid))
            .map(|(i, _)| i)
            .next();
    }

    candidates
        .filter(|(_, m)| heuristic_match(m, confirmed))
        .map(|(i, _)| i)
        .next()
}

fn heuristic_match(optimistic: &Message, confirmed: &Message) -> bool {
    if !optimistic.is_authored_by(&confirmed.author_id) {
        return false;
    }
    let skew = (confirmed.timestamp - optimistic.timestamp).num_milliseconds().abs();
    if skew > RECONCILE_WINDOW_MS {
        return false;
    }

    fn body(m: &Message) -> Option<&str> {
        m.body.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
    match (body(optimistic), body(confirmed)) {
        (Some(a), Some(b)) if a == b => true,
        _ => match (optimistic.present_attachment(), confirmed.present_attachment()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}
