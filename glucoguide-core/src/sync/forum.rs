//! Community forum: a public board of posts with embedded replies. Reading
//! and writing both require a session.

use serde_json::Value;
use uuid::Uuid;

use super::feature::{Feature, OpContext, WriteMode};
use crate::error::AppError;
use crate::models::{ForumBoard, ForumPost, Reply};
use crate::store::{encode_fields, DocPath, DocumentSchema, Query, SchemaError, Snapshot, Write};

pub const COLLECTION: &str = "forumPosts";

#[derive(Debug, Clone)]
pub enum ForumOp {
    Post { question: String },
    Reply { post: String, content: String },
}

#[derive(Debug, Clone, Default)]
pub struct Forum;

impl Forum {
    pub fn path(id: &str) -> Result<DocPath, AppError> {
        Ok(DocPath::new(COLLECTION, id)?)
    }
}

impl Feature for Forum {
    type Key = ();
    type Buffer = ForumBoard;
    type Op = ForumOp;

    const NAME: &'static str = "forum";

    fn write_mode(&self) -> WriteMode {
        WriteMode::Immediate
    }

    fn empty(&self, _key: &()) -> ForumBoard {
        ForumBoard::default()
    }

    fn query(&self, _owner: &str, _key: &()) -> Result<Query, AppError> {
        Ok(Query::collection(COLLECTION))
    }

    fn decode(&self, _owner: &str, _key: &(), snapshot: &Snapshot) -> Result<ForumBoard, SchemaError> {
        let posts = snapshot
            .documents
            .iter()
            .filter_map(|doc| match ForumPost::decode(&doc.path, &doc.data) {
                Ok(post) => Some(post),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid forum post");
                    None
                }
            })
            .collect();
        Ok(ForumBoard::new(posts))
    }

    fn apply(
        &self,
        ctx: &OpContext<'_, ()>,
        board: &mut ForumBoard,
        op: ForumOp,
    ) -> Result<Vec<Write>, AppError> {
        let author = ctx.session.author_name();
        match op {
            ForumOp::Post { question } => {
                let question = question.trim();
                if question.is_empty() {
                    return Err(AppError::validation("Question cannot be empty"));
                }
                let id = Uuid::new_v4().to_string();
                let post = ForumPost::new(id.clone(), question, author, ctx.owner(), ctx.now);
                let write = Write::Set {
                    path: Self::path(&id)?,
                    data: post.encode(),
                };
                board.insert(post);
                Ok(vec![write])
            }
            ForumOp::Reply { post, content } => {
                let content = content.trim();
                if content.is_empty() {
                    return Err(AppError::validation("Reply cannot be empty"));
                }
                let target = board
                    .find_mut(&post)
                    .ok_or_else(|| AppError::validation(format!("Post not found: {}", post)))?;
                let reply = Reply::new(author, content, ctx.owner(), ctx.now);
                let value = Value::Object(encode_fields(&reply));
                target.replies.push(reply);
                Ok(vec![Write::ArrayUnion {
                    path: Self::path(&post)?,
                    field: "replies".to_string(),
                    values: vec![value],
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Session;
    use chrono::Utc;

    fn apply(board: &mut ForumBoard, op: ForumOp) -> Result<Vec<Write>, AppError> {
        let session = Session::authenticated("u1", "a@example.com").with_display_name("Ann");
        let ctx = OpContext {
            session: &session,
            key: &(),
            now: Utc::now(),
        };
        Forum.apply(&ctx, board, op)
    }

    #[test]
    fn test_post_then_reply() {
        let mut board = ForumBoard::default();
        let writes = apply(
            &mut board,
            ForumOp::Post {
                question: "Is oatmeal ok for breakfast?".into(),
            },
        )
        .unwrap();
        assert_eq!(writes.len(), 1);
        let post_id = board.posts()[0].id.clone();
        assert_eq!(board.posts()[0].author, "Ann");

        let writes = apply(
            &mut board,
            ForumOp::Reply {
                post: post_id.clone(),
                content: "Steel-cut oats are best".into(),
            },
        )
        .unwrap();
        match &writes[..] {
            [Write::ArrayUnion { path, field, values }] => {
                assert_eq!(path.id(), post_id);
                assert_eq!(field, "replies");
                assert_eq!(values[0]["author"], "Ann");
                assert_eq!(values[0]["userId"], "u1");
            }
            other => panic!("unexpected writes {:?}", other),
        }
        assert_eq!(board.find(&post_id).unwrap().replies.len(), 1);
    }

    #[test]
    fn test_empty_text_rejected() {
        let mut board = ForumBoard::default();
        assert!(apply(&mut board, ForumOp::Post { question: "  ".into() }).is_err());
        assert!(apply(
            &mut board,
            ForumOp::Reply {
                post: "p1".into(),
                content: "hello".into()
            }
        )
        .is_err());
    }
}
