//! Headless GPU device for testing and tooling.
//!
//! This device doesn't perform any GPU work. It hands out handles, tracks
//! live resources and records every command it receives so tests can assert
//! on exactly what the renderer submitted. It can also simulate allocation
//! exhaustion, missing shader programs and unsupported target formats.

use std::collections::{HashMap, HashSet};

use glam::Vec4;

use super::traits::*;
use super::types::*;

/// A command received by the [`HeadlessDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    WriteBuffer { buffer: BufferHandle, size: usize },
    BindProgram(ProgramKey),
    BindBuffer { slot: String, buffer: BufferHandle },
    BindTexture { slot: String, texture: TextureHandle },
    SetRenderTarget(RenderTargetBinding),
    SetViewport(ViewportRect),
    Clear(ClearFlags),
    Draw(DrawCall),
    SwapBuffers(RenderTargetId),
}

/// Headless GPU device.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_handle: u64,
    buffers: HashMap<BufferHandle, u64>,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    buffer_writes: HashMap<BufferHandle, usize>,
    programs: HashMap<ProgramKey, ProgramHandle>,
    program_keys: HashMap<ProgramHandle, ProgramKey>,
    missing_programs: HashSet<ProgramKey>,
    unsupported_formats: HashSet<TextureFormat>,
    buffer_limit: Option<usize>,
    textures_created: usize,
    commands: Vec<DeviceCommand>,
}

impl HeadlessDevice {
    /// Create a new headless device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail buffer creation with `OutOfMemory` once `limit` buffers are alive.
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = Some(limit);
        self
    }

    /// Report the given program as unavailable.
    pub fn without_program(mut self, key: ProgramKey) -> Self {
        self.missing_programs.insert(key);
        self
    }

    /// Refuse render targets of the given format.
    pub fn without_render_format(mut self, format: TextureFormat) -> Self {
        self.unsupported_formats.insert(format);
        self
    }

    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Number of `write_buffer` calls that targeted `buffer`.
    pub fn buffer_write_count(&self, buffer: BufferHandle) -> usize {
        self.buffer_writes.get(&buffer).copied().unwrap_or(0)
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Total textures ever created, including destroyed ones.
    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn is_buffer_alive(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains_key(&buffer)
    }

    pub fn is_texture_alive(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    /// Every command recorded since the last [`clear_commands`](Self::clear_commands).
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Recorded draw calls in submission order.
    pub fn draw_calls(&self) -> impl Iterator<Item = &DrawCall> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DeviceCommand::Draw(call) => Some(call),
            _ => None,
        })
    }

    /// Programs bound, in order.
    pub fn bound_programs(&self) -> impl Iterator<Item = ProgramKey> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DeviceCommand::BindProgram(key) => Some(*key),
            _ => None,
        })
    }

    pub fn swap_count(&self, target: RenderTargetId) -> usize {
        self.commands
            .iter()
            .filter(|cmd| matches!(cmd, DeviceCommand::SwapBuffers(t) if *t == target))
            .count()
    }
}

impl GpuDevice for HeadlessDevice {
    fn name(&self) -> &str {
        "Headless Device"
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> DeviceResult<BufferHandle> {
        if let Some(limit) = self.buffer_limit {
            if self.buffers.len() >= limit {
                log::trace!(
                    "HeadlessDevice: buffer limit {} reached creating {:?}",
                    limit,
                    desc.label
                );
                return Err(DeviceError::OutOfMemory);
            }
        }
        let handle = BufferHandle(self.next_id());
        log::trace!(
            "HeadlessDevice: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        self.buffers.insert(handle, desc.size);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self.buffers.get(&buffer) {
            Some(&size) => debug_assert!(
                offset + data.len() as u64 <= size,
                "write of {} bytes at {} overflows buffer of {} bytes",
                data.len(),
                offset,
                size
            ),
            None => log::warn!("HeadlessDevice: write to unknown buffer {:?}", buffer),
        }
        *self.buffer_writes.entry(buffer).or_insert(0) += 1;
        self.commands.push(DeviceCommand::WriteBuffer {
            buffer,
            size: data.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        log::trace!("HeadlessDevice: destroying buffer {:?}", buffer);
        self.buffers.remove(&buffer);
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> DeviceResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(DeviceError::TextureCreationFailed(format!(
                "{:?} has zero extent",
                desc.label
            )));
        }
        let handle = TextureHandle(self.next_id());
        log::trace!(
            "HeadlessDevice: creating texture {:?} ({}x{} {:?})",
            desc.label,
            desc.width,
            desc.height,
            desc.format
        );
        self.textures.insert(handle, desc.clone());
        self.textures_created += 1;
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        log::trace!("HeadlessDevice: destroying texture {:?}", texture);
        self.textures.remove(&texture);
    }

    fn supports_render_format(&self, format: TextureFormat) -> bool {
        !self.unsupported_formats.contains(&format)
    }

    fn program(&mut self, key: ProgramKey) -> Option<ProgramHandle> {
        if self.missing_programs.contains(&key) {
            return None;
        }
        if let Some(handle) = self.programs.get(&key) {
            return Some(*handle);
        }
        let handle = ProgramHandle(self.next_id());
        self.programs.insert(key, handle);
        self.program_keys.insert(handle, key);
        Some(handle)
    }

    fn bind_program(&mut self, program: ProgramHandle) {
        match self.program_keys.get(&program) {
            Some(key) => self.commands.push(DeviceCommand::BindProgram(*key)),
            None => log::warn!("HeadlessDevice: binding unknown program {:?}", program),
        }
    }

    fn bind_buffer(&mut self, slot: &str, buffer: BufferHandle) {
        self.commands.push(DeviceCommand::BindBuffer {
            slot: slot.to_string(),
            buffer,
        });
    }

    fn bind_texture(&mut self, slot: &str, texture: TextureHandle, _filter: FilterMode) {
        self.commands.push(DeviceCommand::BindTexture {
            slot: slot.to_string(),
            texture,
        });
    }

    fn set_render_target(&mut self, target: RenderTargetBinding) {
        self.commands.push(DeviceCommand::SetRenderTarget(target));
    }

    fn set_viewport(&mut self, viewport: ViewportRect) {
        self.commands.push(DeviceCommand::SetViewport(viewport));
    }

    fn clear_viewport(&mut self, flags: ClearFlags, _color: Vec4, _depth: f32, _stencil: u8) {
        self.commands.push(DeviceCommand::Clear(flags));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.commands.push(DeviceCommand::Draw(*call));
    }

    fn swap_buffers(&mut self, target: RenderTargetId) {
        log::trace!("HeadlessDevice: presenting {:?}", target);
        self.commands.push(DeviceCommand::SwapBuffers(target));
    }
}
