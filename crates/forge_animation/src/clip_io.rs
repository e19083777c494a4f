//! Clip Persistence
//!
//! A compact little-endian binary format for baked animation clips:
//!
//! ```text
//! u32 clip_count
//! clip_count x {
//!     string name
//!     f32    duration
//!     f32    ticks_per_second
//!     u32    track_count
//!     track_count x {
//!         i32    bone_id
//!         string bone_name
//!         u32 n, n x { f32 time, f32 x, f32 y, f32 z }          positions
//!         u32 n, n x { f32 time, f32 w, f32 x, f32 y, f32 z }   rotations
//!         u32 n, n x { f32 time, f32 x, f32 y, f32 z }          scalings
//!     }
//! }
//! string = u32 byte_length, UTF-8 bytes
//! ```
//!
//! Tracks are stored with both the bone id and the bone name. Reading against a
//! skeleton resolves the name first and falls back to the stored id, so clips
//! survive bone reordering between exports.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use glam::{Quat, Vec3};
use log::{debug, warn};

use forge_core::errors::{ForgeError, Result};

use crate::clip::AnimationClip;
use crate::skeleton::SkeletonHierarchy;
use crate::tracks::{BoneKeyframeTrack, InterpolationMode, KeyframeTrack};
use crate::values::Interpolatable;

/// Upper bound for a single encoded string.
const MAX_STRING_LEN: usize = 64 * 1024;

/// Upper bound for up-front allocations driven by counts read from the stream.
const MAX_PREALLOCATION: usize = 4096;

// ============================================================================
// Writing
// ============================================================================

/// Encodes `clips`; bone names are taken from `skeleton`.
pub fn write_clips<W: Write>(
    writer: &mut W,
    clips: &[&AnimationClip],
    skeleton: &SkeletonHierarchy,
) -> Result<()> {
    let mut out = ClipWriter { inner: writer };

    out.write_len(clips.len())?;
    for clip in clips {
        out.write_string(&clip.name)?;
        out.write_f32(clip.duration)?;
        out.write_f32(clip.ticks_per_second)?;

        let mut tracks: Vec<_> = clip.tracks().collect();
        tracks.sort_unstable_by_key(|(bone_id, _)| *bone_id);

        out.write_len(tracks.len())?;
        for (bone_id, track) in tracks {
            let stored_id = i32::try_from(bone_id)
                .map_err(|_| ForgeError::out_of_bounds("bone id for clip stream", bone_id))?;
            let bone_name = match skeleton.bone(bone_id) {
                Ok(bone) => bone.name(),
                Err(_) => {
                    warn!(
                        "Clip '{}': bone {bone_id} is not in skeleton '{}', stored without a name",
                        clip.name,
                        skeleton.name()
                    );
                    ""
                }
            };

            out.write_i32(stored_id)?;
            out.write_string(bone_name)?;

            out.write_len(track.positions.len())?;
            for (time, v) in track.positions.times.iter().zip(&track.positions.values) {
                out.write_f32s(&[*time, v.x, v.y, v.z])?;
            }
            out.write_len(track.rotations.len())?;
            for (time, q) in track.rotations.times.iter().zip(&track.rotations.values) {
                out.write_f32s(&[*time, q.w, q.x, q.y, q.z])?;
            }
            out.write_len(track.scalings.len())?;
            for (time, v) in track.scalings.times.iter().zip(&track.scalings.values) {
                out.write_f32s(&[*time, v.x, v.y, v.z])?;
            }
        }
    }

    out.inner.flush()?;
    Ok(())
}

pub fn store_clips(
    path: impl AsRef<Path>,
    clips: &[&AnimationClip],
    skeleton: &SkeletonHierarchy,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_clips(&mut writer, clips, skeleton)?;
    debug!("Stored {} animation clip(s) to {}", clips.len(), path.display());
    Ok(())
}

struct ClipWriter<'a, W: Write> {
    inner: &'a mut W,
}

impl<W: Write> ClipWriter<'_, W> {
    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| ForgeError::ClipFormat(format!("count {len} does not fit in u32")))?;
        self.write_u32(len)
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_f32(&mut self, value: f32) -> Result<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_f32s(&mut self, values: &[f32]) -> Result<()> {
        for &value in values {
            self.write_f32(value)?;
        }
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        if value.len() > MAX_STRING_LEN {
            return Err(ForgeError::ClipFormat(format!(
                "string of {} bytes exceeds the {MAX_STRING_LEN} byte limit",
                value.len()
            )));
        }
        self.write_len(value.len())?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Decodes clips and binds their tracks to `skeleton`.
///
/// Tracks that match neither a bone name nor a valid bone id are dropped with
/// a warning.
pub fn read_clips<R: Read>(reader: &mut R, skeleton: &SkeletonHierarchy) -> Result<Vec<AnimationClip>> {
    let mut input = ClipReader { inner: reader };

    let clip_count = input.read_len()?;
    let mut clips = Vec::with_capacity(clip_count.min(MAX_PREALLOCATION));

    for _ in 0..clip_count {
        let name = input.read_string()?;
        let duration = input.read_f32()?;
        let ticks_per_second = input.read_f32()?;
        let track_count = input.read_len()?;

        let mut tracks = Vec::with_capacity(track_count.min(MAX_PREALLOCATION));
        for _ in 0..track_count {
            let stored_id = input.read_i32()?;
            let bone_name = input.read_string()?;
            let track = BoneKeyframeTrack::new(
                input.read_channel(|[x, y, z]: [f32; 3]| Vec3::new(x, y, z))?,
                input.read_channel(|[w, x, y, z]: [f32; 4]| Quat::from_xyzw(x, y, z, w))?,
                input.read_channel(|[x, y, z]: [f32; 3]| Vec3::new(x, y, z))?,
            );

            match resolve_bone(skeleton, &bone_name, stored_id) {
                Some(bone_id) => tracks.push((bone_id, track)),
                None => warn!(
                    "Clip '{name}': track for bone '{bone_name}' ({stored_id}) has no match in skeleton '{}', dropped",
                    skeleton.name()
                ),
            }
        }

        let clip = AnimationClip::new(&name, duration, tracks)
            .with_ticks_per_second(ticks_per_second)
            .with_skeleton_id(skeleton.id());
        clips.push(clip);
    }

    Ok(clips)
}

pub fn load_clips(path: impl AsRef<Path>, skeleton: &SkeletonHierarchy) -> Result<Vec<AnimationClip>> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let clips = read_clips(&mut reader, skeleton)?;
    debug!("Loaded {} animation clip(s) from {}", clips.len(), path.display());
    Ok(clips)
}

fn resolve_bone(skeleton: &SkeletonHierarchy, name: &str, stored_id: i32) -> Option<usize> {
    if let Some(bone) = skeleton.bone_by_name(name) {
        return Some(bone.id());
    }
    usize::try_from(stored_id).ok().filter(|&id| id < skeleton.len())
}

struct ClipReader<'a, R: Read> {
    inner: &'a mut R,
}

impl<R: Read> ClipReader<'_, R> {
    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(map_eof)?;
        Ok(buf)
    }

    fn read_len(&mut self) -> Result<usize> {
        let value = u32::from_le_bytes(self.read_bytes()?);
        usize::try_from(value).map_err(|_| ForgeError::ClipFormat(format!("count {value} too large")))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_bytes()?))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_bytes()?))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        if len > MAX_STRING_LEN {
            return Err(ForgeError::ClipFormat(format!(
                "string length {len} exceeds the {MAX_STRING_LEN} byte limit"
            )));
        }
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).map_err(map_eof)?;
        String::from_utf8(buf).map_err(|e| ForgeError::ClipFormat(format!("invalid UTF-8 string: {e}")))
    }

    /// Reads `u32 count` records of `time` followed by `N` components.
    fn read_channel<T: Interpolatable, const N: usize>(
        &mut self,
        decode: impl Fn([f32; N]) -> T,
    ) -> Result<KeyframeTrack<T>> {
        let count = self.read_len()?;
        let mut times = Vec::with_capacity(count.min(MAX_PREALLOCATION));
        let mut values = Vec::with_capacity(count.min(MAX_PREALLOCATION));

        for _ in 0..count {
            times.push(self.read_f32()?);
            let mut components = [0.0f32; N];
            for component in &mut components {
                *component = self.read_f32()?;
            }
            values.push(decode(components));
        }

        Ok(KeyframeTrack::new(times, values, InterpolationMode::Linear))
    }
}

fn map_eof(error: std::io::Error) -> ForgeError {
    if error.kind() == ErrorKind::UnexpectedEof {
        ForgeError::ClipFormat("unexpected end of clip stream".to_string())
    } else {
        ForgeError::Io(error)
    }
}
