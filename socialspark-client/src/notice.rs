use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use time::UtcDateTime;

/// A failure the user should be told about.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Notice {
    pub at: UtcDateTime,
    pub message: String,
    /// Text to put back into the input the user was typing in.
    pub restored_input: Option<String>,
}

/// Notices waiting to be shown, oldest first. Past `capacity` the oldest
/// notices are dropped.
#[derive(Debug)]
pub struct NoticeBoard {
    capacity: usize,
    notices: Mutex<VecDeque<Notice>>,
}

impl NoticeBoard {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            notices: Mutex::new(VecDeque::new()),
        }
    }

    pub fn post(&self, message: impl Into<String>, restored_input: Option<String>) {
        let mut notices = self.notices.lock();
        if notices.len() == self.capacity {
            notices.pop_front();
        }
        notices.push_back(Notice {
            at: UtcDateTime::now(),
            message: message.into(),
            restored_input,
        });
    }

    /// Takes every waiting notice.
    pub fn drain(&self) -> Vec<Notice> {
        self.notices.lock().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.notices.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::notice::NoticeBoard;

    #[test]
    fn drain_empties_board() {
        let board = NoticeBoard::new(4);
        board.post("first", None);
        board.post("second", Some("retry me".to_owned()));

        let notices = board.drain();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1].restored_input.as_deref(), Some("retry me"));
        assert!(board.is_empty());
    }

    #[test]
    fn oldest_notice_is_dropped_at_capacity() {
        let board = NoticeBoard::new(2);
        board.post("one", None);
        board.post("two", None);
        board.post("three", None);

        let messages: Vec<_> = board.drain().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }
}
