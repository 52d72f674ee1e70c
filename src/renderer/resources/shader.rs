use std::sync::Arc;

use ash::vk;
use color_eyre::Result;

/// Vertex + fragment module pair for one full-screen program. The SPIR-V
/// words come from the host; this crate does not compile shaders.
pub struct GraphicsShader {
    pub vert_mod: vk::ShaderModule,
    pub frag_mod: vk::ShaderModule,
    device: Arc<ash::Device>,
}

impl GraphicsShader {
    pub fn from_spirv(
        vert_code: &[u32],
        frag_code: &[u32],
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let vert_mod = create_shader_module(vert_code, &device)?;
        let frag_mod = create_shader_module(frag_code, &device)?;
        Ok(Self {
            vert_mod,
            frag_mod,
            device,
        })
    }
}

impl Drop for GraphicsShader {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.vert_mod, None);
            self.device.destroy_shader_module(self.frag_mod, None);
        }
    }
}

fn create_shader_module(code: &[u32], device: &ash::Device) -> Result<vk::ShaderModule> {
    let shader_module_info = vk::ShaderModuleCreateInfo::default().code(code);
    let shader_module = unsafe { device.create_shader_module(&shader_module_info, None)? };
    Ok(shader_module)
}
