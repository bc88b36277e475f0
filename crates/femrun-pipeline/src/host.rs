//! Narrow views of the host application: its document and its geometry
//! kernel.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use femrun_io::ResultSet;
use femrun_model::MeshObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Operations the pipeline performs on the host document.
pub trait HostDocument {
    fn exists(&self, id: ObjectId) -> bool;
    /// Creates a post-processing pipeline object for results.
    fn create_result_container(&mut self, name: &str) -> ObjectId;
    /// Creates a raw text object, used for solver logs.
    fn create_text_object(&mut self, name: &str) -> ObjectId;
    fn attach_to_analysis(&mut self, analysis: &str, id: ObjectId);
    fn set_text(&mut self, id: ObjectId, text: &str);
    fn load_result(&mut self, container: ObjectId, result: ResultSet);
    /// Marks the newest post object of `container` as needing update.
    fn touch_last_post_object(&mut self, container: ObjectId);
    fn recompute(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostObjectKind {
    ResultContainer {
        /// Every result loaded into the container, oldest first.
        results: Vec<ResultSet>,
        touched: usize,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostObject {
    pub name: String,
    pub kind: HostObjectKind,
}

/// Document model kept in memory, used by the CLI and in tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocument {
    objects: BTreeMap<ObjectId, HostObject>,
    next_id: u64,
    attachments: Vec<(String, ObjectId)>,
    recomputes: usize,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, id: ObjectId) -> Option<&HostObject> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &HostObject)> {
        self.objects.iter().map(|(id, obj)| (*id, obj))
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<HostObject> {
        self.attachments.retain(|(_, a)| *a != id);
        self.objects.remove(&id)
    }

    pub fn attached_to(&self, analysis: &str) -> Vec<ObjectId> {
        self.attachments
            .iter()
            .filter(|(name, _)| name == analysis)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }

    pub fn latest_result(&self, container: ObjectId) -> Option<&ResultSet> {
        match &self.objects.get(&container)?.kind {
            HostObjectKind::ResultContainer { results, .. } => results.last(),
            HostObjectKind::Text { .. } => None,
        }
    }

    pub fn text(&self, id: ObjectId) -> Option<&str> {
        match &self.objects.get(&id)?.kind {
            HostObjectKind::Text { text } => Some(text),
            HostObjectKind::ResultContainer { .. } => None,
        }
    }

    fn insert(&mut self, name: &str, kind: HostObjectKind) -> ObjectId {
        self.next_id += 1;
        let id = ObjectId(self.next_id);
        self.objects.insert(
            id,
            HostObject {
                name: name.to_string(),
                kind,
            },
        );
        id
    }
}

impl HostDocument for InMemoryDocument {
    fn exists(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    fn create_result_container(&mut self, name: &str) -> ObjectId {
        self.insert(
            name,
            HostObjectKind::ResultContainer {
                results: Vec::new(),
                touched: 0,
            },
        )
    }

    fn create_text_object(&mut self, name: &str) -> ObjectId {
        self.insert(name, HostObjectKind::Text { text: String::new() })
    }

    fn attach_to_analysis(&mut self, analysis: &str, id: ObjectId) {
        let entry = (analysis.to_string(), id);
        if !self.attachments.contains(&entry) {
            self.attachments.push(entry);
        }
    }

    fn set_text(&mut self, id: ObjectId, text: &str) {
        if let Some(HostObject {
            kind: HostObjectKind::Text { text: current },
            ..
        }) = self.objects.get_mut(&id)
        {
            *current = text.to_string();
        }
    }

    fn load_result(&mut self, container: ObjectId, result: ResultSet) {
        if let Some(HostObject {
            kind: HostObjectKind::ResultContainer { results, .. },
            ..
        }) = self.objects.get_mut(&container)
        {
            results.push(result);
        }
    }

    fn touch_last_post_object(&mut self, container: ObjectId) {
        if let Some(HostObject {
            kind: HostObjectKind::ResultContainer { touched, .. },
            ..
        }) = self.objects.get_mut(&container)
        {
            *touched += 1;
        }
    }

    fn recompute(&mut self) {
        self.recomputes += 1;
    }
}

/// Host geometry kernel: exports the shape a mesh is built on.
pub trait GeometryExporter {
    fn export_brep(&self, mesh: &MeshObject, target: &Path) -> io::Result<()>;
}

/// Uses the geometry file named by the mesh object, resolved against `base`
/// when relative.
#[derive(Debug, Default, Clone)]
pub struct FileGeometry {
    pub base: Option<PathBuf>,
}

impl FileGeometry {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    pub fn resolve(&self, mesh: &MeshObject) -> PathBuf {
        match &self.base {
            Some(base) if mesh.geometry.is_relative() => base.join(&mesh.geometry),
            _ => mesh.geometry.clone(),
        }
    }
}

impl GeometryExporter for FileGeometry {
    fn export_brep(&self, mesh: &MeshObject, target: &Path) -> io::Result<()> {
        let source = self.resolve(mesh);
        fs::copy(&source, target).map(|_| ()).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("geometry '{}' could not be exported: {err}", source.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use femrun_io::ResultFormat;
    use femrun_model::MeshGenerator;

    fn empty_result() -> ResultSet {
        ResultSet {
            source: PathBuf::from("case0001.vtu"),
            format: ResultFormat::Vtu,
            points: Vec::new(),
            cell_count: 0,
            fields: Vec::new(),
        }
    }

    #[test]
    fn result_container_collects_loads() {
        let mut doc = InMemoryDocument::new();
        let container = doc.create_result_container("SolverElmerResult");
        doc.attach_to_analysis("Analysis", container);
        doc.attach_to_analysis("Analysis", container);
        doc.load_result(container, empty_result());
        doc.touch_last_post_object(container);
        doc.recompute();

        assert_eq!(doc.attached_to("Analysis"), vec![container]);
        assert!(doc.latest_result(container).is_some());
        assert_eq!(doc.recompute_count(), 1);
        assert!(matches!(
            doc.object(container).map(|o| &o.kind),
            Some(HostObjectKind::ResultContainer { touched: 1, .. })
        ));
    }

    #[test]
    fn text_objects_hold_latest_text() {
        let mut doc = InMemoryDocument::new();
        let id = doc.create_text_object("SolverMoFEMOutput");
        doc.set_text(id, "first");
        doc.set_text(id, "second");
        assert_eq!(doc.text(id), Some("second"));
        doc.remove(id);
        assert!(!doc.exists(id));
    }

    #[test]
    fn file_geometry_resolves_relative_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("box.brep"), "DBRep_DrawableShape").expect("write geometry");
        let mesh = MeshObject::new("BoxMesh", "Box", MeshGenerator::Gmsh, "box.brep");
        let target = dir.path().join("export.brep");

        FileGeometry::new(dir.path())
            .export_brep(&mesh, &target)
            .expect("export should copy");
        assert_eq!(
            fs::read_to_string(&target).expect("exported file"),
            "DBRep_DrawableShape"
        );

        let err = FileGeometry::default()
            .export_brep(&mesh, &target)
            .expect_err("unresolved relative path should fail");
        assert!(err.to_string().contains("box.brep"));
    }
}
