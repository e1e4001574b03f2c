//! Stock resource kinds.
//!
//! Headless, file-backed implementations of the resource contract for the
//! usual renderer assets. "Loading" here means reading and validating files;
//! a GPU backend would upload in the same place.

use std::{
    cell::{Cell, OnceCell},
    collections::BTreeMap,
    path::{Path, PathBuf},
    rc::Rc,
};

use anyhow::{anyhow, bail, Context};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    data::{BuildData, ResourceKind},
    handle::Handle,
    id::ResourceId,
    loader::ResourceLoader,
    resource::Resource,
    state::ResolveMode,
};

/// Registers builders for every stock kind, resolving paths against
/// `asset_root`.
pub fn register_stock_builders(loader: &ResourceLoader, asset_root: impl Into<PathBuf>) {
    let root = Rc::new(asset_root.into());

    let shader_root = root.clone();
    loader.register_builder(ResourceKind::SHADER, move |data| Shader::build(&shader_root, data));
    let texture_root = root.clone();
    loader.register_builder(ResourceKind::TEXTURE, move |data| {
        Texture::build(&texture_root, data)
    });
    let mesh_root = root.clone();
    loader.register_builder(ResourceKind::MESH, move |data| Mesh::build(&mesh_root, data));
    let font_root = root;
    loader.register_builder(ResourceKind::FONT, move |data| Font::build(&font_root, data));

    loader.register_builder(ResourceKind::PROGRAM, Program::build);
    loader.register_builder(ResourceKind::MATERIAL, Material::build);
    loader.register_builder(ResourceKind::RENDERABLE_MESH, RenderableMesh::build);
    loader.register_builder(ResourceKind::RENDERABLE_TEXTURE, RenderableTexture::build);
}

fn read_bytes(root: &Path, relative: &str) -> anyhow::Result<Bytes> {
    let path = root.join(relative);
    let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(Bytes::from(bytes))
}

fn read_text(root: &Path, relative: &str) -> anyhow::Result<String> {
    let path = root.join(relative);
    std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
}

/// A loaded dependency, or an error naming it.
fn loaded<T: Resource>(handle: &Handle<T>, loader: &ResourceLoader, what: &str) -> anyhow::Result<Rc<T>> {
    handle
        .get(loader, ResolveMode::Immediate)
        .ok_or_else(|| anyhow!("{} {} is not ready", what, handle.id()))
}

// =============================================================================
// Shader
// =============================================================================

/// Pipeline stage a shader runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderParams {
    pub stage: ShaderStage,
    pub path: String,
}

/// Shader source text.
pub struct Shader {
    root: Rc<PathBuf>,
    stage: ShaderStage,
    source: OnceCell<String>,
}

impl Shader {
    fn build(root: &Rc<PathBuf>, data: &BuildData) -> anyhow::Result<Self> {
        let params: ShaderParams = data.decode()?;
        Ok(Self {
            root: root.clone(),
            stage: params.stage,
            source: OnceCell::new(),
        })
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> Option<&str> {
        self.source.get().map(String::as_str)
    }
}

impl Resource for Shader {
    fn load(&self, data: &BuildData, _loader: &ResourceLoader) -> anyhow::Result<()> {
        let params: ShaderParams = data.decode()?;
        let source = read_text(&self.root, &params.path)?;
        if source.trim().is_empty() {
            bail!("shader {} is empty", params.path);
        }
        let _ = self.source.set(source);
        Ok(())
    }
}

// =============================================================================
// Program
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramParams {
    pub vertex: Handle<Shader>,
    pub fragment: Handle<Shader>,
}

/// A vertex + fragment shader pair.
pub struct Program {
    vertex: Handle<Shader>,
    fragment: Handle<Shader>,
    linked: Cell<bool>,
}

impl Program {
    fn build(data: &BuildData) -> anyhow::Result<Self> {
        let params: ProgramParams = data.decode()?;
        Ok(Self {
            vertex: params.vertex,
            fragment: params.fragment,
            linked: Cell::new(false),
        })
    }

    pub fn vertex(&self) -> &Handle<Shader> {
        &self.vertex
    }

    pub fn fragment(&self) -> &Handle<Shader> {
        &self.fragment
    }

    pub fn is_linked(&self) -> bool {
        self.linked.get()
    }
}

impl Resource for Program {
    fn dependencies(&self) -> Vec<ResourceId> {
        vec![self.vertex.id(), self.fragment.id()]
    }

    fn wire_dependencies(&self, loader: &ResourceLoader, mode: ResolveMode) {
        self.vertex.resolve(loader, mode);
        self.fragment.resolve(loader, mode);
    }

    fn load(&self, _data: &BuildData, loader: &ResourceLoader) -> anyhow::Result<()> {
        let vertex = loaded(&self.vertex, loader, "vertex shader")?;
        let fragment = loaded(&self.fragment, loader, "fragment shader")?;
        if vertex.stage() != ShaderStage::Vertex {
            bail!("shader {} is not a vertex shader", self.vertex.id());
        }
        if fragment.stage() != ShaderStage::Fragment {
            bail!("shader {} is not a fragment shader", self.fragment.id());
        }
        self.linked.set(true);
        Ok(())
    }
}

// =============================================================================
// Texture
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureParams {
    pub path: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Raw RGBA8 pixels (or an encoded image when no size is given).
pub struct Texture {
    root: Rc<PathBuf>,
    params: TextureParams,
    pixels: OnceCell<Bytes>,
}

impl Texture {
    fn build(root: &Rc<PathBuf>, data: &BuildData) -> anyhow::Result<Self> {
        Ok(Self {
            root: root.clone(),
            params: data.decode()?,
            pixels: OnceCell::new(),
        })
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.params.width.zip(self.params.height)
    }

    pub fn pixels(&self) -> Option<Bytes> {
        self.pixels.get().cloned()
    }
}

impl Resource for Texture {
    fn load(&self, _data: &BuildData, _loader: &ResourceLoader) -> anyhow::Result<()> {
        let pixels = read_bytes(&self.root, &self.params.path)?;
        if let Some((width, height)) = self.size() {
            let expected = width as usize * height as usize * 4;
            if pixels.len() != expected {
                bail!(
                    "texture {} has {} bytes, expected {} for {}x{} RGBA",
                    self.params.path,
                    pixels.len(),
                    expected,
                    width,
                    height
                );
            }
        }
        let _ = self.pixels.set(pixels);
        Ok(())
    }
}

// =============================================================================
// Mesh
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshParams {
    pub path: String,
}

/// Vertex positions parsed from a whitespace-separated float list.
pub struct Mesh {
    root: Rc<PathBuf>,
    path: String,
    positions: OnceCell<Vec<[f32; 3]>>,
}

impl Mesh {
    fn build(root: &Rc<PathBuf>, data: &BuildData) -> anyhow::Result<Self> {
        let params: MeshParams = data.decode()?;
        Ok(Self {
            root: root.clone(),
            path: params.path,
            positions: OnceCell::new(),
        })
    }

    pub fn positions(&self) -> Option<&[[f32; 3]]> {
        self.positions.get().map(Vec::as_slice)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions().map_or(0, <[_]>::len)
    }
}

fn parse_positions(text: &str) -> anyhow::Result<Vec<[f32; 3]>> {
    let floats = text
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f32>()
                .with_context(|| format!("bad float '{}'", token))
        })
        .collect::<anyhow::Result<Vec<f32>>>()?;
    if floats.is_empty() || floats.len() % 3 != 0 {
        bail!("expected a positive multiple of 3 floats, got {}", floats.len());
    }
    Ok(floats.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

impl Resource for Mesh {
    fn load(&self, _data: &BuildData, _loader: &ResourceLoader) -> anyhow::Result<()> {
        let text = read_text(&self.root, &self.path)?;
        let positions = parse_positions(&text).with_context(|| format!("mesh {}", self.path))?;
        let _ = self.positions.set(positions);
        Ok(())
    }
}

// =============================================================================
// Font
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontParams {
    pub path: String,
    pub size: f32,
}

pub struct Font {
    root: Rc<PathBuf>,
    params: FontParams,
    face: OnceCell<Bytes>,
}

impl Font {
    fn build(root: &Rc<PathBuf>, data: &BuildData) -> anyhow::Result<Self> {
        Ok(Self {
            root: root.clone(),
            params: data.decode()?,
            face: OnceCell::new(),
        })
    }

    pub fn size(&self) -> f32 {
        self.params.size
    }

    pub fn face(&self) -> Option<Bytes> {
        self.face.get().cloned()
    }
}

impl Resource for Font {
    fn load(&self, _data: &BuildData, _loader: &ResourceLoader) -> anyhow::Result<()> {
        if self.params.size.is_nan() || self.params.size <= 0.0 {
            bail!("font size must be positive, got {}", self.params.size);
        }
        let face = read_bytes(&self.root, &self.params.path)?;
        let _ = self.face.set(face);
        Ok(())
    }
}

// =============================================================================
// Material
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialParams {
    pub program: Handle<Program>,
    #[serde(default)]
    pub textures: Vec<Handle<Texture>>,
    #[serde(default)]
    pub properties: BTreeMap<String, f32>,
}

/// A program plus the textures and scalar properties bound to it.
pub struct Material {
    params: MaterialParams,
}

impl Material {
    fn build(data: &BuildData) -> anyhow::Result<Self> {
        Ok(Self {
            params: data.decode()?,
        })
    }

    pub fn program(&self) -> &Handle<Program> {
        &self.params.program
    }

    pub fn textures(&self) -> &[Handle<Texture>] {
        &self.params.textures
    }

    pub fn property(&self, name: &str) -> Option<f32> {
        self.params.properties.get(name).copied()
    }
}

impl Resource for Material {
    fn dependencies(&self) -> Vec<ResourceId> {
        std::iter::once(self.params.program.id())
            .chain(self.params.textures.iter().map(Handle::id))
            .collect()
    }

    fn wire_dependencies(&self, loader: &ResourceLoader, mode: ResolveMode) {
        self.params.program.resolve(loader, mode);
        for texture in &self.params.textures {
            texture.resolve(loader, mode);
        }
    }

    fn load(&self, _data: &BuildData, loader: &ResourceLoader) -> anyhow::Result<()> {
        loaded(&self.params.program, loader, "program")?;
        for texture in &self.params.textures {
            loaded(texture, loader, "texture")?;
        }
        Ok(())
    }
}

// =============================================================================
// RenderableMesh
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderableMeshParams {
    pub mesh: Handle<Mesh>,
    pub material: Handle<Material>,
}

/// A mesh paired with the material it is drawn with.
pub struct RenderableMesh {
    mesh: Handle<Mesh>,
    material: Handle<Material>,
}

impl RenderableMesh {
    fn build(data: &BuildData) -> anyhow::Result<Self> {
        let params: RenderableMeshParams = data.decode()?;
        Ok(Self {
            mesh: params.mesh,
            material: params.material,
        })
    }

    pub fn mesh(&self) -> &Handle<Mesh> {
        &self.mesh
    }

    pub fn material(&self) -> &Handle<Material> {
        &self.material
    }
}

impl Resource for RenderableMesh {
    fn dependencies(&self) -> Vec<ResourceId> {
        vec![self.mesh.id(), self.material.id()]
    }

    fn wire_dependencies(&self, loader: &ResourceLoader, mode: ResolveMode) {
        self.mesh.resolve(loader, mode);
        self.material.resolve(loader, mode);
    }

    fn load(&self, _data: &BuildData, loader: &ResourceLoader) -> anyhow::Result<()> {
        let mesh = loaded(&self.mesh, loader, "mesh")?;
        loaded(&self.material, loader, "material")?;
        if mesh.vertex_count() == 0 {
            bail!("mesh {} has no vertices", self.mesh.id());
        }
        Ok(())
    }
}

// =============================================================================
// RenderableTexture
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderableTextureParams {
    pub texture: Handle<Texture>,
    pub material: Handle<Material>,
}

/// A texture drawn as a screen-space quad with the given material.
pub struct RenderableTexture {
    texture: Handle<Texture>,
    material: Handle<Material>,
    extent: Cell<Option<(u32, u32)>>,
}

impl RenderableTexture {
    fn build(data: &BuildData) -> anyhow::Result<Self> {
        let params: RenderableTextureParams = data.decode()?;
        Ok(Self {
            texture: params.texture,
            material: params.material,
            extent: Cell::new(None),
        })
    }

    pub fn texture(&self) -> &Handle<Texture> {
        &self.texture
    }

    pub fn material(&self) -> &Handle<Material> {
        &self.material
    }

    /// Quad size in pixels, once loaded.
    pub fn extent(&self) -> Option<(u32, u32)> {
        self.extent.get()
    }
}

impl Resource for RenderableTexture {
    fn dependencies(&self) -> Vec<ResourceId> {
        vec![self.texture.id(), self.material.id()]
    }

    fn wire_dependencies(&self, loader: &ResourceLoader, mode: ResolveMode) {
        self.texture.resolve(loader, mode);
        self.material.resolve(loader, mode);
    }

    fn load(&self, _data: &BuildData, loader: &ResourceLoader) -> anyhow::Result<()> {
        let texture = loaded(&self.texture, loader, "texture")?;
        loaded(&self.material, loader, "material")?;
        let Some(extent) = texture.size() else {
            bail!("texture {} has no size to draw at", self.texture.id());
        };
        self.extent.set(Some(extent));
        Ok(())
    }
}
