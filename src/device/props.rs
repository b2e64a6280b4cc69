// CLASSIFICATION: COMMUNITY
// Filename: props.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Device property translation.

use std::ffi::c_char;

pub const DEVICE_NAME_LEN: usize = 256;

/// Device properties reported by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    pub name: String,
    pub total_global_mem: usize,
    pub shared_mem_per_block: usize,
    pub regs_per_block: i32,
    pub warp_size: i32,
    pub max_threads_per_block: i32,
    pub max_threads_dim: [i32; 3],
    pub max_grid_size: [i32; 3],
    pub clock_rate: i32,
    pub memory_clock_rate: i32,
    pub total_const_mem: usize,
    pub major: i32,
    pub minor: i32,
    pub multi_processor_count: i32,
    pub l2_cache_size: i32,
    pub max_threads_per_multi_processor: i32,
    pub compute_mode: i32,
    pub concurrent_kernels: i32,
    pub pci_bus_id: i32,
    pub pci_device_id: i32,
    pub is_multi_gpu_board: i32,
    pub can_map_host_memory: i32,
    pub gcn_arch: i32,
}

/// Flat C record filled by `hipi_GetDeviceProperties`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HipiDeviceProp {
    pub name: [c_char; DEVICE_NAME_LEN],
    pub total_global_mem: usize,
    pub shared_mem_per_block: usize,
    pub regs_per_block: i32,
    pub warp_size: i32,
    pub max_threads_per_block: i32,
    pub max_threads_dim: [i32; 3],
    pub max_grid_size: [i32; 3],
    pub clock_rate: i32,
    pub memory_clock_rate: i32,
    pub total_const_mem: usize,
    pub major: i32,
    pub minor: i32,
    pub multi_processor_count: i32,
    pub l2_cache_size: i32,
    pub max_threads_per_multi_processor: i32,
    pub compute_mode: i32,
    pub concurrent_kernels: i32,
    pub pci_bus_id: i32,
    pub pci_device_id: i32,
    pub is_multi_gpu_board: i32,
    pub can_map_host_memory: i32,
    pub gcn_arch: i32,
}

impl Default for HipiDeviceProp {
    fn default() -> Self {
        Self::from(&DeviceProperties::default())
    }
}

impl From<&DeviceProperties> for HipiDeviceProp {
    fn from(props: &DeviceProperties) -> Self {
        let mut name = [0 as c_char; DEVICE_NAME_LEN];
        // Keep the trailing NUL.
        for (dst, src) in name
            .iter_mut()
            .zip(props.name.bytes().take(DEVICE_NAME_LEN - 1))
        {
            *dst = src as c_char;
        }
        Self {
            name,
            total_global_mem: props.total_global_mem,
            shared_mem_per_block: props.shared_mem_per_block,
            regs_per_block: props.regs_per_block,
            warp_size: props.warp_size,
            max_threads_per_block: props.max_threads_per_block,
            max_threads_dim: props.max_threads_dim,
            max_grid_size: props.max_grid_size,
            clock_rate: props.clock_rate,
            memory_clock_rate: props.memory_clock_rate,
            total_const_mem: props.total_const_mem,
            major: props.major,
            minor: props.minor,
            multi_processor_count: props.multi_processor_count,
            l2_cache_size: props.l2_cache_size,
            max_threads_per_multi_processor: props.max_threads_per_multi_processor,
            compute_mode: props.compute_mode,
            concurrent_kernels: props.concurrent_kernels,
            pci_bus_id: props.pci_bus_id,
            pci_device_id: props.pci_device_id,
            is_multi_gpu_board: props.is_multi_gpu_board,
            can_map_host_memory: props.can_map_host_memory,
            gcn_arch: props.gcn_arch,
        }
    }
}

/// Decode a NUL-terminated C name buffer.
pub fn name_from_c(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_copy_keeps_fields() {
        let props = DeviceProperties {
            name: "gfx906".into(),
            total_global_mem: 1 << 30,
            warp_size: 64,
            max_grid_size: [i32::MAX, 65535, 65535],
            pci_bus_id: 3,
            gcn_arch: 906,
            ..Default::default()
        };
        let raw = HipiDeviceProp::from(&props);
        assert_eq!(name_from_c(&raw.name), "gfx906");
        assert_eq!(raw.total_global_mem, 1 << 30);
        assert_eq!(raw.warp_size, 64);
        assert_eq!(raw.max_grid_size, [i32::MAX, 65535, 65535]);
        assert_eq!(raw.pci_bus_id, 3);
        assert_eq!(raw.gcn_arch, 906);
    }

    #[test]
    fn long_names_stay_terminated() {
        let props = DeviceProperties {
            name: "x".repeat(400),
            ..Default::default()
        };
        let raw = HipiDeviceProp::from(&props);
        assert_eq!(raw.name[DEVICE_NAME_LEN - 1], 0);
        assert_eq!(name_from_c(&raw.name).len(), DEVICE_NAME_LEN - 1);
    }
}
