//! Named-placeholder rewriting.
//!
//! The engine only understands positional `?` placeholders. This module
//! rewrites `:name` placeholders to `?` in a single left-to-right pass,
//! recording each name against the positional index it received, so the
//! statement can later resolve `param_by_name`. String literals are copied
//! verbatim; placeholders inside them are never counted or rewritten.

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Longest accepted named-placeholder identifier.
pub(crate) const MAX_NAME_LEN: usize = 31;

/// Output of one rewriting pass over a statement's SQL text.
#[derive(Debug, Clone)]
pub(crate) struct RewrittenSql {
   /// Engine-valid SQL with every placeholder positional.
   pub text: String,

   /// Total positional parameter count (`?` occurrences plus rewritten
   /// named placeholders).
   pub positional_count: usize,

   /// Named placeholder to positional index. On a duplicated name the last
   /// occurrence wins.
   pub named: IndexMap<String, usize>,
}

/// Rewrites `sql` into positional form.
///
/// Errors are returned before any state escapes, so a failed rewrite
/// leaves no partial name entries behind.
pub(crate) fn rewrite_placeholders(sql: &str) -> Result<RewrittenSql> {
   let mut text = String::with_capacity(sql.len());
   let mut named = IndexMap::new();
   let mut positional_count = 0usize;

   let mut chars = sql.chars().peekable();
   while let Some(c) = chars.next() {
      match c {
         '?' => {
            positional_count += 1;
            text.push('?');
         }
         '\'' => {
            text.push('\'');
            loop {
               match chars.next() {
                  Some('\'') => {
                     text.push('\'');
                     break;
                  }
                  Some(other) => text.push(other),
                  None => {
                     return Err(Error::InvalidStatement(
                        "unterminated string literal".to_string(),
                     ));
                  }
               }
            }
         }
         ':' => {
            let mut name = String::new();
            while let Some(&next) = chars.peek() {
               if next.is_ascii_alphanumeric() || next == '_' {
                  if name.len() == MAX_NAME_LEN {
                     return Err(Error::InvalidStatement(format!(
                        "named placeholder exceeds {MAX_NAME_LEN} characters"
                     )));
                  }
                  name.push(next);
                  chars.next();
               } else {
                  break;
               }
            }
            if name.is_empty() {
               return Err(Error::InvalidStatement(
                  "':' must be followed by a placeholder name".to_string(),
               ));
            }
            text.push('?');
            named.insert(name, positional_count);
            positional_count += 1;
         }
         other => text.push(other),
      }
   }

   Ok(RewrittenSql {
      text,
      positional_count,
      named,
   })
}
