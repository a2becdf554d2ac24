/// Device placement utilities
use candle_core::{Device, Tensor};

use crate::data::Batch;

/// Move a payload onto a device, recursively for composite payloads.
pub trait ToDevice: Sized {
    fn to_device(&self, device: &Device) -> crate::Result<Self>;
}

impl ToDevice for Tensor {
    fn to_device(&self, device: &Device) -> crate::Result<Self> {
        Ok(Tensor::to_device(self, device)?)
    }
}

impl ToDevice for Batch {
    fn to_device(&self, device: &Device) -> crate::Result<Self> {
        Ok(Batch {
            inputs: ToDevice::to_device(&self.inputs, device)?,
            targets: ToDevice::to_device(&self.targets, device)?,
        })
    }
}

impl<T: ToDevice> ToDevice for Vec<T> {
    fn to_device(&self, device: &Device) -> crate::Result<Self> {
        self.iter().map(|item| item.to_device(device)).collect()
    }
}

impl<T: ToDevice> ToDevice for Option<T> {
    fn to_device(&self, device: &Device) -> crate::Result<Self> {
        self.as_ref().map(|item| item.to_device(device)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_tensor_to_device() {
        let device = Device::Cpu;
        let tensor = Tensor::zeros((2, 3), DType::F32, &device).unwrap();

        let moved = ToDevice::to_device(&tensor, &device).unwrap();
        assert_eq!(moved.dims(), &[2, 3]);
    }

    #[test]
    fn test_composite_to_device() {
        let device = Device::Cpu;
        let tensors = vec![
            Tensor::zeros(4, DType::U32, &device).unwrap(),
            Tensor::ones(4, DType::U32, &device).unwrap(),
        ];

        let moved = tensors.to_device(&device).unwrap();
        assert_eq!(moved.len(), 2);

        let none: Option<Tensor> = None;
        assert!(none.to_device(&device).unwrap().is_none());
    }
}
