// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post history.

use rusqlite::{Row, params};
use voxpost_core::{UserId, VoxpostError};

use crate::database::{Database, map_tr_err, parse_col};
use crate::models::{NewPost, PostRecord};

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        content_kind: parse_col(2, row.get(2)?)?,
        voice_text: row.get(3)?,
        response_text: row.get(4)?,
        is_saved: row.get(5)?,
        transcription_ms: row.get(6)?,
        generation_ms: row.get(7)?,
        fragment_count: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Append a post to the user's history. Returns the new row id.
pub async fn insert_post(db: &Database, post: NewPost) -> Result<i64, VoxpostError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO post_history (user_id, content_kind, voice_text, response_text,
                     is_saved, transcription_ms, generation_ms, fragment_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    post.user_id.0,
                    post.content_kind.to_string(),
                    post.voice_text,
                    post.response_text,
                    post.is_saved,
                    post.transcription_ms,
                    post.generation_ms,
                    post.fragment_count,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent posts for a user, newest first.
pub async fn list_posts(
    db: &Database,
    user: UserId,
    limit: i64,
) -> Result<Vec<PostRecord>, VoxpostError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, content_kind, voice_text, response_text, is_saved,
                        transcription_ms, generation_ms, fragment_count, created_at
                 FROM post_history WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user.0, limit], post_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Count a user's posts, optionally only the saved ones.
pub async fn count_posts(
    db: &Database,
    user: UserId,
    saved_only: bool,
) -> Result<i64, VoxpostError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM post_history WHERE user_id = ?1 AND (?2 = 0 OR is_saved = 1)",
                params![user.0, saved_only],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users;
    use tempfile::tempdir;
    use voxpost_core::ContentKind;

    fn post(user: i64, text: &str, saved: bool) -> NewPost {
        NewPost {
            user_id: UserId(user),
            content_kind: ContentKind::YoutubeScript,
            voice_text: "Fragment 1: hello".into(),
            response_text: text.into(),
            is_saved: saved,
            transcription_ms: Some(1200),
            generation_ms: Some(800),
            fragment_count: 1,
        }
    }

    #[tokio::test]
    async fn insert_and_list_posts() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("p.db").to_str().unwrap())
            .await
            .unwrap();
        users::ensure_user(&db, UserId(4), None).await.unwrap();

        insert_post(&db, post(4, "first", true)).await.unwrap();
        insert_post(&db, post(4, "pending", false)).await.unwrap();

        let posts = list_posts(&db, UserId(4), 10).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].response_text, "pending");
        assert_eq!(posts[1].content_kind, ContentKind::YoutubeScript);

        assert_eq!(count_posts(&db, UserId(4), false).await.unwrap(), 2);
        assert_eq!(count_posts(&db, UserId(4), true).await.unwrap(), 1);
    }
}
