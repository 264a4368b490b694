//! Expands the project list into independent tasks

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use monbench_common::{short_sha, AlgorithmSet, Task};

/// One row of the project list
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectEntry {
    pub link: String,
    pub sha: String,
}

/// Read the `link,sha` project list
pub fn read_projects(path: &Path) -> Result<Vec<ProjectEntry>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Could not open project list {}", path.display()))?;

    let mut entries = Vec::new();
    for row in reader.deserialize() {
        let entry: ProjectEntry =
            row.with_context(|| format!("Malformed row in {}", path.display()))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Where each task writes its artifacts
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    pub root: PathBuf,
    /// One task per algorithm, nested under the project directory
    pub split: bool,
}

impl ArtifactLayout {
    /// `<root>/<project>_<sha7>` or, in split mode, `<root>/<project>_<sha7>/<ALGO>`
    pub fn dir_for(&self, task: &Task) -> PathBuf {
        let project_dir = self
            .root
            .join(format!("{}_{}", task.project_name(), short_sha(&task.sha)));
        if self.split {
            project_dir.join(task.algorithms.label())
        } else {
            project_dir
        }
    }
}

/// Expand projects by algorithm set. Batch mode yields one task per project,
/// otherwise one task per (project, algorithm), project-major.
pub fn expand(projects: &[ProjectEntry], algorithms: &AlgorithmSet, batch: bool) -> Vec<Task> {
    let mut tasks = Vec::new();
    for project in projects {
        if batch {
            tasks.push(Task::new(&project.link, &project.sha, algorithms.clone()));
        } else {
            for algorithm in algorithms.iter() {
                tasks.push(Task::new(
                    &project.link,
                    &project.sha,
                    AlgorithmSet::single(*algorithm),
                ));
            }
        }
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use monbench_common::Algorithm;

    fn entries() -> Vec<ProjectEntry> {
        vec![
            ProjectEntry {
                link: "https://github.com/org/alpha.git".to_string(),
                sha: "aaaaaaaaaaaa".to_string(),
            },
            ProjectEntry {
                link: "https://github.com/org/beta".to_string(),
                sha: "bbbbbbbbbbbb".to_string(),
            },
        ]
    }

    #[test]
    fn test_split_expansion_is_project_major() {
        let algorithms = AlgorithmSet::new([Algorithm::Original, Algorithm::D]);
        let tasks = expand(&entries(), &algorithms, false);

        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].algorithms.label(), "ORIGINAL");
        assert_eq!(tasks[1].algorithms.label(), "D");
        assert_eq!(tasks[2].project_name(), "beta");
    }

    #[test]
    fn test_batch_expansion_keeps_whole_set() {
        let tasks = expand(&entries(), &AlgorithmSet::default(), true);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].algorithms.len(), 6);
    }

    #[test]
    fn test_artifact_dirs_are_unique_per_task() {
        let layout = ArtifactLayout {
            root: PathBuf::from("results"),
            split: true,
        };
        let tasks = expand(&entries(), &AlgorithmSet::default(), false);
        let mut dirs: Vec<_> = tasks.iter().map(|t| layout.dir_for(t)).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), tasks.len());
        assert_eq!(
            layout.dir_for(&tasks[0]),
            PathBuf::from("results/alpha_aaaaaaa/ORIGINAL")
        );
    }

    #[test]
    fn test_read_projects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project-links.csv");
        std::fs::write(&path, "link,sha\nhttps://github.com/org/alpha,abc123\n").unwrap();

        let projects = read_projects(&path).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].sha, "abc123");
    }
}
