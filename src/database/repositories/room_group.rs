use crate::core::grouping::RoomGroup;
use crate::database::DatabaseError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted room group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRoomGroup {
    pub id: String,
    pub project_id: String,
    pub room_type: String,
    pub similarity: f64,
    pub image_ids: Vec<String>,
    pub created_at: String,
}

impl From<StoredRoomGroup> for RoomGroup {
    fn from(stored: StoredRoomGroup) -> Self {
        RoomGroup {
            image_ids: stored.image_ids,
            room_type: stored.room_type,
            similarity: stored.similarity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub total_groups: i64,
    pub multi_image_groups: i64,
    pub singleton_groups: i64,
    pub total_images_in_groups: i64,
}

/// SQLite persistence for a project's room groups.
pub struct RoomGroupRepository {
    conn: Connection,
}

impl RoomGroupRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Replace every stored group of `project_id` with `groups`.
    pub fn save_groups(
        &self,
        project_id: &str,
        groups: &[RoomGroup],
    ) -> Result<Vec<StoredRoomGroup>, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM room_groups WHERE project_id = ?1",
            params![project_id],
        )?;

        let mut stored = Vec::with_capacity(groups.len());
        for (position, group) in groups.iter().enumerate() {
            let id = format!("grp_{}", Uuid::new_v4().simple());

            tx.execute(
                "INSERT INTO room_groups (id, project_id, room_type, similarity, position, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    project_id,
                    group.room_type,
                    group.similarity,
                    position as i64,
                    now
                ],
            )?;

            for (image_position, image_id) in group.image_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO room_group_images (group_id, image_id, position) VALUES (?1, ?2, ?3)",
                    params![id, image_id, image_position as i64],
                )?;
            }

            stored.push(StoredRoomGroup {
                id,
                project_id: project_id.to_string(),
                room_type: group.room_type.clone(),
                similarity: group.similarity,
                image_ids: group.image_ids.clone(),
                created_at: now.clone(),
            });
        }

        tx.commit()?;
        log::info!("Saved {} room groups for project {}", stored.len(), project_id);
        Ok(stored)
    }

    pub fn find_by_id(&self, id: &str) -> Result<StoredRoomGroup, DatabaseError> {
        let group = self
            .conn
            .query_row(
                "SELECT id, project_id, room_type, similarity, created_at
                 FROM room_groups WHERE id = ?1",
                params![id],
                group_from_row,
            )
            .optional()?
            .ok_or_else(|| DatabaseError::NotFound(id.to_string()))?;

        self.with_image_ids(group)
    }

    /// Groups of a project, in the order they were produced.
    pub fn find_by_project_id(&self, project_id: &str) -> Result<Vec<StoredRoomGroup>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, project_id, room_type, similarity, created_at
             FROM room_groups WHERE project_id = ?1 ORDER BY position",
        )?;
        let groups = stmt
            .query_map(params![project_id], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        groups
            .into_iter()
            .map(|group| self.with_image_ids(group))
            .collect()
    }

    pub fn get_image_ids_for_group(&self, group_id: &str) -> Result<Vec<String>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT image_id FROM room_group_images WHERE group_id = ?1 ORDER BY position",
        )?;
        let image_ids = stmt
            .query_map(params![group_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(image_ids)
    }

    pub fn delete_by_project_id(&self, project_id: &str) -> Result<usize, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM room_group_images WHERE group_id IN
             (SELECT id FROM room_groups WHERE project_id = ?1)",
            params![project_id],
        )?;
        let deleted_count = tx.execute(
            "DELETE FROM room_groups WHERE project_id = ?1",
            params![project_id],
        )?;
        tx.commit()?;
        Ok(deleted_count)
    }

    pub fn count_by_project_id(&self, project_id: &str) -> Result<i64, DatabaseError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM room_groups WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn exists(&self, group_id: &str) -> Result<bool, DatabaseError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM room_groups WHERE id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_group_stats(&self, project_id: &str) -> Result<GroupStats, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(i.image_id)
             FROM room_groups g
             LEFT JOIN room_group_images i ON i.group_id = g.id
             WHERE g.project_id = ?1
             GROUP BY g.id",
        )?;
        let sizes = stmt
            .query_map(params![project_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GroupStats {
            total_groups: sizes.len() as i64,
            multi_image_groups: sizes.iter().filter(|&&size| size > 1).count() as i64,
            singleton_groups: sizes.iter().filter(|&&size| size == 1).count() as i64,
            total_images_in_groups: sizes.iter().sum(),
        })
    }

    fn with_image_ids(&self, mut group: StoredRoomGroup) -> Result<StoredRoomGroup, DatabaseError> {
        group.image_ids = self.get_image_ids_for_group(&group.id)?;
        Ok(group)
    }
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRoomGroup> {
    Ok(StoredRoomGroup {
        id: row.get(0)?,
        project_id: row.get(1)?,
        room_type: row.get(2)?,
        similarity: row.get(3)?,
        image_ids: Vec::new(),
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::establish_in_memory;

    fn setup_repo() -> RoomGroupRepository {
        RoomGroupRepository::new(establish_in_memory().unwrap())
    }

    fn group(ids: &[&str], room_type: &str, similarity: f64) -> RoomGroup {
        RoomGroup {
            image_ids: ids.iter().map(|id| id.to_string()).collect(),
            room_type: room_type.to_string(),
            similarity,
        }
    }

    fn sample_groups() -> Vec<RoomGroup> {
        vec![
            group(&["img3", "img1", "img4"], "Living Room", 0.65),
            group(&["img2"], "Kitchen", 1.0),
        ]
    }

    #[test]
    fn test_save_and_find_by_project() {
        let repo = setup_repo();
        let saved = repo.save_groups("proj_1", &sample_groups()).unwrap();

        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|g| g.id.starts_with("grp_")));

        let loaded = repo.find_by_project_id("proj_1").unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded[0].image_ids, vec!["img3", "img1", "img4"]);

        let as_groups: Vec<RoomGroup> = loaded.into_iter().map(RoomGroup::from).collect();
        assert_eq!(as_groups, sample_groups());
    }

    #[test]
    fn test_save_replaces_previous_groups() {
        let repo = setup_repo();
        let first = repo.save_groups("proj_1", &sample_groups()).unwrap();
        repo.save_groups("proj_1", &[group(&["img1", "img2"], "Kitchen", 0.65)])
            .unwrap();

        assert_eq!(repo.count_by_project_id("proj_1").unwrap(), 1);
        assert!(!repo.exists(&first[0].id).unwrap());
        assert!(repo.get_image_ids_for_group(&first[0].id).unwrap().is_empty());
    }

    #[test]
    fn test_projects_are_isolated() {
        let repo = setup_repo();
        repo.save_groups("proj_1", &sample_groups()).unwrap();
        repo.save_groups("proj_2", &[group(&["x"], "Bedroom", 1.0)])
            .unwrap();

        assert_eq!(repo.count_by_project_id("proj_1").unwrap(), 2);
        assert_eq!(repo.count_by_project_id("proj_2").unwrap(), 1);

        let deleted = repo.delete_by_project_id("proj_1").unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(repo.count_by_project_id("proj_1").unwrap(), 0);
        assert_eq!(repo.count_by_project_id("proj_2").unwrap(), 1);
    }

    #[test]
    fn test_find_by_id() {
        let repo = setup_repo();
        let saved = repo.save_groups("proj_1", &sample_groups()).unwrap();

        let found = repo.find_by_id(&saved[1].id).unwrap();
        assert_eq!(found.room_type, "Kitchen");
        assert_eq!(found.image_ids, vec!["img2"]);

        let missing = repo.find_by_id("grp_missing");
        assert!(matches!(missing, Err(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_group_stats() {
        let repo = setup_repo();
        repo.save_groups("proj_1", &sample_groups()).unwrap();

        let stats = repo.get_group_stats("proj_1").unwrap();
        assert_eq!(
            stats,
            GroupStats {
                total_groups: 2,
                multi_image_groups: 1,
                singleton_groups: 1,
                total_images_in_groups: 4,
            }
        );

        let empty = repo.get_group_stats("proj_none").unwrap();
        assert_eq!(empty.total_groups, 0);
        assert_eq!(empty.total_images_in_groups, 0);
    }
}
