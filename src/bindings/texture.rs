// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
N-dimensional textures with capability fallback.

A [`Texture`] holds 1D, 2D or 3D image data of any [`crate::pixel_formats::Element`] type with
1 to 4 channels.  Like every resource in this crate it is a descriptor until activated; data
and sampling parameters are queued and flushed at the next activation.

# Data and parameter queues

Data changes and parameter changes (interpolation, wrapping) are queued separately.  Changing
a parameter re-issues only the parameter; it never re-uploads image data.

# Capability fallback

A full upload first asks the device whether it can hold the requested extent.  When it cannot,
the texture tries, in order:

1. zero-padding every extent to the next power of two, once, if [`Fallback::allow_padding`];
2. halving the image with a box filter, repeatedly, if [`Fallback::allow_downsample`], up to
   [`Fallback::max_downsample_attempts`] times.

If nothing fits, activation fails with [`Error::OutOfMemory`].  While the device holds an adapted
image the texture keeps the full-resolution data on the host, so partial updates still land in
the right place.

```
use buffers_and_bindings::HeadlessDevice;
use buffers_and_bindings::bindings::texture::{Texture, TextureData};

let texture = Texture::new(TextureData::new(&[2, 2], 1, &[0u8, 64, 128, 255]).unwrap()).unwrap();
//patch the bottom-right texel
texture
    .set_data(TextureData::new(&[1, 1], 1, &[7u8]).unwrap(), Some(&[1, 1]))
    .unwrap();

let mut device = HeadlessDevice::new();
texture.activate(&mut device).unwrap();
let handle = texture.handle().unwrap();
assert_eq!(device.texture_contents(handle).unwrap(), &[0, 64, 128, 7]);
```
*/

use crate::Error;
use crate::bindings::dirty_tracking::PendingQueue;
use crate::bindings::resource_tracking::{
    self, BindGuard, Lifecycle, ObjectKind, ObjectState, RawHandle, Tracked,
};
use crate::bindings::sampler::{Interpolation, Wrapping};
use crate::bindings::software::texture::{copy_region, downsample, pad_to_power_of_two, region_fits};
use crate::bindings::texture_builder::TextureBuilder;
use crate::bittricks::is_power_of_two;
use crate::images::device::{Device, TexelData, TextureParameter, TextureTarget};
use crate::pixel_formats::{Element, ElementType, TextureFormat, element_bytes};
use logwise::privacy::LogIt;
use std::cell::RefCell;
use std::rc::Rc;

/// Bytes needed for `shape` texels, or `None` on overflow.
fn byte_len(shape: &[usize], channels: usize, element: ElementType) -> Option<usize> {
    shape
        .iter()
        .try_fold(channels.checked_mul(element.size())?, |len, &extent| len.checked_mul(extent))
}

/// Host image data: an extent, a channel count and the interleaved elements.
///
/// Extents list axes slowest-varying first, so a 2D image is `[height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    shape: Vec<usize>,
    channels: usize,
    element: ElementType,
    bytes: Vec<u8>,
}

impl TextureData {
    /// Image data from typed elements.
    ///
    /// `data` must hold exactly `shape.product() * channels` elements.  `shape` must have 1 to 3
    /// non-zero extents and `channels` must be 1 to 4.
    pub fn new<T: Element>(shape: &[usize], channels: usize, data: &[T]) -> Result<Self, Error> {
        Self::from_bytes(shape, channels, T::TYPE, element_bytes(data).to_vec())
    }

    pub fn from_bytes(
        shape: &[usize],
        channels: usize,
        element: ElementType,
        bytes: Vec<u8>,
    ) -> Result<Self, Error> {
        let valid = (1..=3).contains(&shape.len())
            && !shape.contains(&0)
            && (1..=4).contains(&channels)
            && byte_len(shape, channels, element) == Some(bytes.len());
        if !valid {
            return Err(Error::Shape {
                shape: shape.to_vec(),
                channels,
                len: bytes.len(),
            });
        }
        Ok(Self::from_parts(shape.to_vec(), channels, element, bytes))
    }

    pub(crate) fn from_parts(
        shape: Vec<usize>,
        channels: usize,
        element: ElementType,
        bytes: Vec<u8>,
    ) -> Self {
        TextureData {
            shape,
            channels,
            element,
            bytes,
        }
    }

    /// Zero-filled data.
    pub(crate) fn zeros(shape: &[usize], channels: usize, element: ElementType) -> Result<Self, Error> {
        let len = byte_len(shape, channels, element).ok_or_else(|| Error::Shape {
            shape: shape.to_vec(),
            channels,
            len: 0,
        })?;
        Self::from_bytes(shape, channels, element, vec![0; len])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
    pub fn channels(&self) -> usize {
        self.channels
    }
    pub fn element(&self) -> ElementType {
        self.element
    }
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
    /// Bytes per texel, all channels included.
    pub fn texel_size(&self) -> usize {
        self.channels * self.element.size()
    }

    pub(crate) fn texels(&self, format: TextureFormat) -> TexelData<'_> {
        TexelData {
            shape: &self.shape,
            format,
            element: self.element,
            data: &self.bytes,
        }
    }
}

/// What a texture may do when the device rejects its extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    /// Halve the image with a box filter until it fits.
    pub allow_downsample: bool,
    /// Zero-pad non-power-of-two extents.
    pub allow_padding: bool,
    pub max_downsample_attempts: u32,
}

impl Default for Fallback {
    fn default() -> Self {
        Fallback {
            allow_downsample: true,
            allow_padding: false,
            max_downsample_attempts: 9,
        }
    }
}

#[derive(Debug)]
enum TextureWrite {
    /// Reallocates storage with this data.
    Upload(TextureData),
    Update {
        offset: Vec<usize>,
        data: TextureData,
    },
}

/// Adapts `data` until the device accepts its extent.
///
/// `Ok(None)` means the data fits as-is.
fn fit_to_device(
    device: &mut dyn Device,
    target: TextureTarget,
    format: TextureFormat,
    data: &TextureData,
    fallback: &Fallback,
    name: &str,
) -> Result<Option<TextureData>, Error> {
    let element = data.element();
    if device.probe_texture(target, data.shape(), format, element) {
        return Ok(None);
    }
    let _fallback_interval = logwise::perfwarn_begin!("texture capability fallback");
    let mut attempts = 0;

    if fallback.allow_padding && !data.shape().iter().all(|&n| is_power_of_two(n)) {
        attempts += 1;
        let padded = pad_to_power_of_two(data);
        if device.probe_texture(target, padded.shape(), format, element) {
            logwise::info_sync!(
                "padded texture {name} from {from} to {to}",
                name = LogIt(&name),
                from = LogIt(&data.shape()),
                to = LogIt(&padded.shape())
            );
            return Ok(Some(padded));
        }
    }

    if fallback.allow_downsample {
        let mut current: Option<TextureData> = None;
        for _ in 0..fallback.max_downsample_attempts {
            let next = downsample(current.as_ref().unwrap_or(data));
            attempts += 1;
            if device.probe_texture(target, next.shape(), format, element) {
                logwise::info_sync!(
                    "downsampled texture {name} from {from} to {to}",
                    name = LogIt(&name),
                    from = LogIt(&data.shape()),
                    to = LogIt(&next.shape())
                );
                return Ok(Some(next));
            }
            current = Some(next);
        }
    }

    Err(Error::OutOfMemory {
        shape: data.shape().to_vec(),
        attempts,
    })
}

#[derive(Debug)]
pub(crate) struct TextureState {
    lifecycle: Lifecycle,
    target: TextureTarget,
    shape: Vec<usize>,
    channels: usize,
    element: ElementType,
    format: TextureFormat,
    /// Format the caller asked for; survives full uploads.
    explicit_format: Option<TextureFormat>,
    interpolation: Interpolation,
    wrapping: Wrapping,
    fallback: Fallback,
    /// Extent of the device storage, which differs from `shape` after a fallback.
    uploaded: Option<Vec<usize>>,
    /// Full-resolution data, kept while the device holds an adapted image.
    shadow: Option<TextureData>,
    data_queue: PendingQueue<TextureWrite>,
    parameter_queue: PendingQueue<TextureParameter>,
}

impl TextureState {
    fn resolve_format(&self, channels: usize) -> Result<TextureFormat, Error> {
        match self.explicit_format {
            Some(format) if format.channels() == channels => Ok(format),
            Some(format) => Err(Error::Format {
                format,
                expected: format.channels(),
                got: channels,
            }),
            None => TextureFormat::from_channels(channels).ok_or(Error::Format {
                format: self.format,
                expected: self.format.channels(),
                got: channels,
            }),
        }
    }

    fn set_data(&mut self, data: TextureData, offset: Option<&[usize]>) -> Result<(), Error> {
        let ndim = self.target.ndim();
        if data.shape().len() != ndim {
            return Err(Error::Dimensions {
                expected: ndim,
                got: data.shape().len(),
            });
        }
        match offset {
            Some(offset) => {
                if data.element() != self.element {
                    return Err(Error::ElementType {
                        expected: self.element,
                        got: data.element(),
                    });
                }
                if data.channels() != self.channels {
                    return Err(Error::Format {
                        format: self.format,
                        expected: self.channels,
                        got: data.channels(),
                    });
                }
                if !region_fits(&self.shape, offset, data.shape()) {
                    return Err(Error::Region {
                        offset: offset.to_vec(),
                        shape: data.shape().to_vec(),
                        extent: self.shape.clone(),
                    });
                }
                self.data_queue.push(TextureWrite::Update {
                    offset: offset.to_vec(),
                    data,
                });
            }
            None => {
                let format = self.resolve_format(data.channels())?;
                let same_storage = self.uploaded.as_deref() == Some(data.shape())
                    && self.shadow.is_none()
                    && data.element() == self.element
                    && format == self.format
                    && !self
                        .data_queue
                        .iter()
                        .any(|w| matches!(w, TextureWrite::Upload(_)));
                if same_storage {
                    //same extent and type: overwrite in place
                    let origin = vec![0; ndim];
                    self.data_queue.replace(TextureWrite::Update {
                        offset: origin,
                        data,
                    });
                } else {
                    self.shape = data.shape().to_vec();
                    self.channels = data.channels();
                    self.element = data.element();
                    self.format = format;
                    self.data_queue.replace(TextureWrite::Upload(data));
                }
            }
        }
        self.lifecycle.mark_dirty();
        Ok(())
    }

    fn upload(
        &mut self,
        device: &mut dyn Device,
        handle: RawHandle,
        data: &TextureData,
    ) -> Result<(), Error> {
        let fitted = fit_to_device(
            device,
            self.target,
            self.format,
            data,
            &self.fallback,
            self.lifecycle.debug_name(),
        )?;
        let device_data = fitted.as_ref().unwrap_or(data);
        device.upload_texture(handle, device_data.texels(self.format))?;
        logwise::trace_sync!(
            "uploaded {extent} texels to texture {name}",
            extent = LogIt(&device_data.shape()),
            name = LogIt(&self.lifecycle.debug_name())
        );
        self.uploaded = Some(device_data.shape().to_vec());
        self.shadow = fitted.is_some().then(|| data.clone());
        Ok(())
    }

    fn apply_update(
        &mut self,
        device: &mut dyn Device,
        handle: RawHandle,
        offset: &[usize],
        data: &TextureData,
    ) -> Result<(), Error> {
        let adapted = match &mut self.shadow {
            Some(shadow) => {
                let texel = shadow.texel_size();
                let extent = shadow.shape().to_vec();
                copy_region(&extent, shadow.bytes_mut(), offset, data.shape(), data.bytes(), texel);
                Some(shadow.clone())
            }
            None => None,
        };
        match adapted {
            //the device holds a resampled image; rebuild it from the patched host copy
            Some(full) => self.upload(device, handle, &full),
            None => Ok(device.update_texture(handle, offset, data.texels(self.format))?),
        }
    }
}

impl Tracked for TextureState {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn create(&mut self, device: &mut dyn Device) -> Result<RawHandle, Error> {
        Ok(device.create_texture(self.target)?)
    }

    fn update(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        let mut entries: Vec<TextureWrite> = self.data_queue.drain().collect();
        if self.uploaded.is_none() && !matches!(entries.first(), Some(TextureWrite::Upload(_))) {
            //no storage yet, e.g. after delete(); start from the best copy we have
            let base = match self.shadow.clone() {
                Some(shadow) => shadow,
                None => TextureData::zeros(&self.shape, self.channels, self.element)?,
            };
            entries.insert(0, TextureWrite::Upload(base));
        }
        for i in 0..entries.len() {
            let result = match &entries[i] {
                TextureWrite::Upload(data) => self.upload(device, handle, data),
                TextureWrite::Update { offset, data } => {
                    self.apply_update(device, handle, offset, data)
                }
            };
            if let Err(err) = result {
                self.data_queue.requeue_front(entries.split_off(i));
                return Err(err);
            }
        }
        let parameters: Vec<TextureParameter> = self.parameter_queue.drain().collect();
        for (i, parameter) in parameters.iter().enumerate() {
            if let Err(err) = device.set_texture_parameter(handle, *parameter) {
                self.parameter_queue.requeue_front(parameters[i..].to_vec());
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn bind(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        device.bind_texture(self.target, Some(handle));
        Ok(())
    }

    fn unbind(&mut self, device: &mut dyn Device, _handle: RawHandle) {
        device.bind_texture(self.target, None);
    }

    fn destroy(&mut self, device: &mut dyn Device, handle: RawHandle) -> Result<(), Error> {
        Ok(device.delete_texture(handle)?)
    }

    fn forget_device_state(&mut self) {
        self.uploaded = None;
        //a new device object starts with default sampling state
        self.parameter_queue.replace(TextureParameter::Interpolation(self.interpolation));
        self.parameter_queue.push(TextureParameter::Wrapping(self.wrapping));
    }
}

impl Drop for TextureState {
    fn drop(&mut self) {
        if self.lifecycle.handle().is_some() {
            logwise::warn_sync!(
                "texture {name} dropped while its device object is alive; call delete() first",
                name = LogIt(&self.lifecycle.debug_name())
            );
        }
    }
}

/**
A device texture.

Cloning a `Texture` yields another handle to the same texture, which is how programs keep
the textures bound to their samplers alive.  Mutation goes through `&self`.
*/
#[derive(Debug, Clone)]
pub struct Texture {
    shared: Rc<RefCell<TextureState>>,
}

impl Texture {
    /// A texture holding `data`, with default format, sampling and fallback.
    pub fn new(data: TextureData) -> Result<Self, Error> {
        TextureBuilder::new(data).build()
    }

    pub(crate) fn from_builder(
        data: TextureData,
        debug_name: &str,
        explicit_format: Option<TextureFormat>,
        interpolation: Interpolation,
        wrapping: Wrapping,
        fallback: Fallback,
    ) -> Result<Self, Error> {
        let target = TextureTarget::for_ndim(data.shape().len()).ok_or(Error::Dimensions {
            expected: 2,
            got: data.shape().len(),
        })?;
        let mut parameter_queue = PendingQueue::new();
        parameter_queue.push(TextureParameter::Interpolation(interpolation));
        parameter_queue.push(TextureParameter::Wrapping(wrapping));
        let mut state = TextureState {
            lifecycle: Lifecycle::new(ObjectKind::Texture, debug_name),
            target,
            shape: data.shape().to_vec(),
            channels: data.channels(),
            element: data.element(),
            format: TextureFormat::Luminance,
            explicit_format,
            interpolation,
            wrapping,
            fallback,
            uploaded: None,
            shadow: None,
            data_queue: PendingQueue::new(),
            parameter_queue,
        };
        state.set_data(data, None)?;
        Ok(Texture {
            shared: Rc::new(RefCell::new(state)),
        })
    }

    /**
    Replaces image data.

    With `offset`, only the region of `data`'s extent at `offset` is updated; the element type
    and channel count must match the texture's and the region must lie inside it.

    Without `offset`, `data` replaces the whole image and may change its extent, element type
    and channel count.  The format is recomputed from the channel count unless one was set
    explicitly.  Every queued update is discarded.
    */
    pub fn set_data(&self, data: TextureData, offset: Option<&[usize]>) -> Result<(), Error> {
        self.shared.borrow_mut().set_data(data, offset)
    }

    pub fn set_interpolation(&self, interpolation: Interpolation) {
        let mut state = self.shared.borrow_mut();
        state.interpolation = interpolation;
        state
            .parameter_queue
            .push(TextureParameter::Interpolation(interpolation));
        state.lifecycle.mark_dirty();
    }

    pub fn set_wrapping(&self, wrapping: Wrapping) {
        let mut state = self.shared.borrow_mut();
        state.wrapping = wrapping;
        state.parameter_queue.push(TextureParameter::Wrapping(wrapping));
        state.lifecycle.mark_dirty();
    }

    pub fn interpolation(&self) -> Interpolation {
        self.shared.borrow().interpolation
    }
    pub fn wrapping(&self) -> Wrapping {
        self.shared.borrow().wrapping
    }
    pub fn target(&self) -> TextureTarget {
        self.shared.borrow().target
    }
    /// Extent of the image as last set, before any fallback.
    pub fn shape(&self) -> Vec<usize> {
        self.shared.borrow().shape.clone()
    }
    pub fn channels(&self) -> usize {
        self.shared.borrow().channels
    }
    pub fn element(&self) -> ElementType {
        self.shared.borrow().element
    }
    pub fn format(&self) -> TextureFormat {
        self.shared.borrow().format
    }
    /// Extent of the device storage, once uploaded.  Smaller or larger than [`Self::shape`]
    /// when a fallback applied.
    pub fn uploaded_shape(&self) -> Option<Vec<usize>> {
        self.shared.borrow().uploaded.clone()
    }
    pub fn handle(&self) -> Option<RawHandle> {
        self.shared.borrow().lifecycle.handle()
    }
    pub fn state(&self) -> ObjectState {
        self.shared.borrow().lifecycle.state()
    }
    /// Queued uploads and updates.
    pub fn pending_updates(&self) -> usize {
        self.shared.borrow().data_queue.len()
    }
    pub fn pending_parameters(&self) -> usize {
        self.shared.borrow().parameter_queue.len()
    }

    pub fn materialize(&self, device: &mut dyn Device) -> Result<(), Error> {
        resource_tracking::materialize(&mut *self.shared.borrow_mut(), device).map(|_| ())
    }

    /// Flushes queued changes and binds the texture to the currently selected unit.
    pub fn activate(&self, device: &mut dyn Device) -> Result<(), Error> {
        resource_tracking::activate(&mut *self.shared.borrow_mut(), device)
    }

    pub fn deactivate(&self, device: &mut dyn Device) {
        resource_tracking::deactivate(&mut *self.shared.borrow_mut(), device)
    }

    pub fn with_active<R>(
        &self,
        device: &mut dyn Device,
        f: impl FnOnce(&mut dyn Device) -> R,
    ) -> Result<R, Error> {
        self.activate(device)?;
        let mut guard = BindGuard::new(device, |d: &mut dyn Device| self.deactivate(d));
        Ok(f(guard.device()))
    }

    /// Frees the device texture.  Activating again re-creates it from the host data it still has.
    pub fn delete(&self, device: &mut dyn Device) {
        resource_tracking::delete(&mut *self.shared.borrow_mut(), device)
    }

    /// Selects `unit` and binds the texture there.
    pub(crate) fn activate_on_unit(&self, device: &mut dyn Device, unit: u32) -> Result<(), Error> {
        device.select_texture_unit(unit)?;
        self.activate(device)
    }

    pub(crate) fn same_texture(&self, other: &Texture) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessDevice;
    use crate::images::device::DeviceLimits;

    fn gray(shape: &[usize]) -> TextureData {
        let n = shape.iter().product::<usize>();
        let values: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
        TextureData::new(shape, 1, &values).unwrap()
    }

    #[test]
    fn data_validation() {
        assert!(TextureData::new(&[2, 2], 1, &[0u8; 3]).is_err());
        assert!(TextureData::new(&[2, 2], 5, &[0u8; 20]).is_err());
        assert!(TextureData::new(&[1, 1, 1, 1], 1, &[0u8]).is_err());
        assert!(TextureData::new(&[0, 2], 1, &[0u8; 0]).is_err());
        let data = TextureData::new(&[2, 3], 2, &[0.0f32; 12]).unwrap();
        assert_eq!(data.texel_size(), 8);
    }

    #[test]
    fn oversized_extents_are_shape_errors() {
        assert!(matches!(
            TextureData::from_bytes(&[usize::MAX, 2], 1, ElementType::U8, Vec::new()),
            Err(Error::Shape { .. })
        ));
        assert!(matches!(
            TextureData::from_bytes(&[usize::MAX / 2, 1], 4, ElementType::F32, Vec::new()),
            Err(Error::Shape { .. })
        ));
        assert!(matches!(
            TextureData::zeros(&[usize::MAX, 3], 1, ElementType::U8),
            Err(Error::Shape { len: 0, .. })
        ));
    }

    #[test]
    fn format_follows_channels() {
        let texture = Texture::new(TextureData::new(&[1, 2], 3, &[0u8; 6]).unwrap()).unwrap();
        assert_eq!(texture.format(), TextureFormat::Rgb);
        texture
            .set_data(TextureData::new(&[1, 2], 4, &[0u8; 8]).unwrap(), None)
            .unwrap();
        assert_eq!(texture.format(), TextureFormat::Rgba);
        assert_eq!(texture.target(), TextureTarget::Texture2D);
    }

    #[test]
    fn partial_update_checks() {
        let texture = Texture::new(gray(&[4, 4])).unwrap();
        let wrong_type = TextureData::new(&[1, 1], 1, &[0.5f32]).unwrap();
        assert!(matches!(
            texture.set_data(wrong_type, Some(&[0, 0])),
            Err(Error::ElementType { .. })
        ));
        let wrong_channels = TextureData::new(&[1, 1], 2, &[0u8, 0]).unwrap();
        assert!(matches!(
            texture.set_data(wrong_channels, Some(&[0, 0])),
            Err(Error::Format { .. })
        ));
        assert!(matches!(
            texture.set_data(gray(&[2, 2]), Some(&[3, 0])),
            Err(Error::Region { .. })
        ));
        assert!(matches!(
            texture.set_data(gray(&[4]), None),
            Err(Error::Dimensions {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn full_upload_clears_updates() {
        let texture = Texture::new(gray(&[2, 2])).unwrap();
        texture.set_data(gray(&[1, 1]), Some(&[0, 0])).unwrap();
        texture.set_data(gray(&[1, 1]), Some(&[1, 1])).unwrap();
        texture.set_data(gray(&[3, 3]), None).unwrap();
        assert_eq!(texture.pending_updates(), 1);
    }

    #[test]
    fn same_shape_set_is_update() {
        let texture = Texture::new(gray(&[2, 2])).unwrap();
        let mut device = HeadlessDevice::new();
        texture.activate(&mut device).unwrap();
        let handle = texture.handle().unwrap();
        texture
            .set_data(TextureData::new(&[2, 2], 1, &[9u8, 8, 7, 6]).unwrap(), None)
            .unwrap();
        texture.activate(&mut device).unwrap();
        assert_eq!(device.texture_uploads(handle), 1);
        assert_eq!(device.texture_contents(handle).unwrap(), &[9, 8, 7, 6]);
    }

    #[test]
    fn parameters_flush_without_data() {
        let texture = Texture::new(gray(&[2, 2])).unwrap();
        let mut device = HeadlessDevice::new();
        texture.activate(&mut device).unwrap();
        let handle = texture.handle().unwrap();
        texture.set_interpolation(Interpolation::Linear);
        texture.set_wrapping(Wrapping::Repeat);
        assert_eq!(texture.pending_updates(), 0);
        assert_eq!(texture.pending_parameters(), 2);
        texture.activate(&mut device).unwrap();
        assert_eq!(device.texture_uploads(handle), 1);
        assert_eq!(
            device.texture_parameters(handle),
            Some((Interpolation::Linear, Wrapping::Repeat))
        );
    }

    #[test]
    fn padding_once() {
        let data = gray(&[3, 5]);
        let texture = TextureBuilder::new(data)
            .allow_padding(true)
            .allow_downsample(false)
            .build()
            .unwrap();
        let mut device = HeadlessDevice::with_limits(DeviceLimits {
            require_power_of_two: true,
            ..DeviceLimits::default()
        });
        texture.activate(&mut device).unwrap();
        assert_eq!(texture.uploaded_shape(), Some(vec![4, 8]));
        assert_eq!(texture.shape(), vec![3, 5]);
    }

    #[test]
    fn fallback_disabled_fails() {
        let texture = TextureBuilder::new(gray(&[40, 40]))
            .allow_downsample(false)
            .build()
            .unwrap();
        let mut device = HeadlessDevice::with_limits(DeviceLimits {
            max_texture_size: 16,
            ..DeviceLimits::default()
        });
        assert!(matches!(
            texture.activate(&mut device),
            Err(Error::OutOfMemory { attempts: 0, .. })
        ));
        assert_eq!(texture.state(), ObjectState::Error);
    }

    #[test]
    fn update_after_downsample_uses_host_copy() {
        let texture = Texture::new(TextureData::new(&[4], 1, &[0u8, 0, 0, 0]).unwrap()).unwrap();
        let mut device = HeadlessDevice::with_limits(DeviceLimits {
            max_texture_size: 2,
            ..DeviceLimits::default()
        });
        texture.activate(&mut device).unwrap();
        assert_eq!(texture.uploaded_shape(), Some(vec![2]));
        texture
            .set_data(TextureData::new(&[2], 1, &[100u8, 200]).unwrap(), Some(&[2]))
            .unwrap();
        texture.activate(&mut device).unwrap();
        let handle = texture.handle().unwrap();
        assert_eq!(device.texture_contents(handle).unwrap(), &[0, 150]);
    }

    #[test]
    fn recreated_after_delete() {
        let texture = Texture::new(gray(&[2, 2])).unwrap();
        let mut device = HeadlessDevice::new();
        texture.activate(&mut device).unwrap();
        texture.delete(&mut device);
        assert_eq!(texture.state(), ObjectState::Deleted);
        texture
            .set_data(TextureData::new(&[1, 1], 1, &[5u8]).unwrap(), Some(&[0, 1]))
            .unwrap();
        texture.activate(&mut device).unwrap();
        let handle = texture.handle().unwrap();
        //recreated storage starts zeroed
        assert_eq!(device.texture_contents(handle).unwrap(), &[0, 5, 0, 0]);
        texture.delete(&mut device);
    }
}
