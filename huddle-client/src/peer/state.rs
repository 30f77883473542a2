use std::fmt;

/// Negotiation state of one peer session.
///
/// `Connected` means the offer/answer exchange has been applied on both
/// ends. Transport connectivity is tracked separately and only matters for
/// the failure rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    New,
    OfferPending,
    AnswerPending,
    Connected,
    Closed,
    Failed,
}

impl PeerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PeerState::Closed | PeerState::Failed)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::New => "new",
            PeerState::OfferPending => "offer-pending",
            PeerState::AnswerPending => "answer-pending",
            PeerState::Connected => "connected",
            PeerState::Closed => "closed",
            PeerState::Failed => "failed",
        };
        f.write_str(name)
    }
}
