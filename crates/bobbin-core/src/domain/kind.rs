//! TaskKind - ハンドラを選ぶための判別子
//!
//! kind は文字列ではなくアプリ側の enum で表す。typo はコンパイル時に弾かれ、
//! ハンドラ登録漏れは `SchedulerBuilder::expect_kinds` で起動時に検出できる。

use std::fmt;
use std::hash::Hash;

use serde::Serialize;

/// Discriminant naming which handler executes a task.
///
/// Implemented automatically for any small `Copy` enum that is hashable,
/// displayable and serializable:
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
/// enum Job { FilterContent, SyncNotes }
///
/// impl fmt::Display for Job { /* ... */ }
/// ```
pub trait TaskKind:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static
{
}

impl<T> TaskKind for T where
    T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static
{
}
