//! Record layouts by format version.
//!
//! Each historical version range has a pure reader. Readers share section
//! helpers but keep each range's field order exactly as it was written.
//! There is a single writer, for [`CURRENT_VERSION`](super::CURRENT_VERSION).
//!
//! | Version | Added |
//! |---------|-------|
//! | 1 | identity, quantities, dates, status, flags, setup/run/post-processing spans, locks, comments |
//! | 2 | storage and clean spans |
//! | 3 | production info overrides, people usage |
//! | 4 | processing-start and end-of-run dates, buffer records |
//! | 5 | batch amount |
//! | 6 | end-of-post-processing and end-of-storage dates, clean-out grade |
//! | 7 | per-resource production info |
//! | 8 | generated lots |
//! | 9 | split id, actual resources used, batch linkage |
//! | 10 | dynamic buffers, earliest-buffer resource key |
//! | 11 | full earliest-buffer record |

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use super::codec::{ByteReader, ByteWriter};
use crate::error::{ActivityError, Result};
use crate::models::{
    ActivityFlag, ActivityFlags, ActivityId, Batch, BatchId, BufferInfo, EarliestBuffer,
    InternalActivity, OperationRef, Overridable, PeopleUsage, ProductionInfoOverride,
    ProductionStatus, ResourceBufferInfo, ResourceKey, TimeSpan,
};

/// A reader for one version range.
pub(crate) struct Layout {
    /// Versions this reader handles.
    pub versions: RangeInclusive<u32>,
    /// Reads one record.
    pub read: fn(&mut ByteReader<'_>, u32) -> Result<InternalActivity>,
}

/// Readers in version order.
pub(crate) static LAYOUTS: [Layout; 4] = [
    Layout {
        versions: 1..=2,
        read: read_v1_2,
    },
    Layout {
        versions: 3..=5,
        read: read_v3_5,
    },
    Layout {
        versions: 6..=8,
        read: read_v6_8,
    },
    Layout {
        versions: 9..=11,
        read: read_v9_11,
    },
];

/// The reader for `version`.
pub(crate) fn layout_for(version: u32) -> Option<&'static Layout> {
    LAYOUTS.iter().find(|l| l.versions.contains(&version))
}

// ================================
// Readers
// ================================

fn read_v1_2(r: &mut ByteReader<'_>, version: u32) -> Result<InternalActivity> {
    let mut a = read_core(r, version)?;
    finish_legacy(&mut a);
    Ok(a)
}

fn read_v3_5(r: &mut ByteReader<'_>, version: u32) -> Result<InternalActivity> {
    let mut a = read_core(r, version)?;
    read_production_settings(r, &mut a)?;
    if version >= 4 {
        a.reported.processing_start_date = r.read_timestamp()?;
        a.reported.end_of_run_date = r.read_timestamp()?;
        a.buffer = read_buffer(r, version)?;
    }
    if version >= 5 {
        a.batch_amount = r.read_decimal()?;
    }
    finish_legacy(&mut a);
    Ok(a)
}

fn read_v6_8(r: &mut ByteReader<'_>, version: u32) -> Result<InternalActivity> {
    let mut a = read_core(r, version)?;
    read_production_settings(r, &mut a)?;
    read_v4_to_v6_sections(r, &mut a, version)?;
    if version >= 7 {
        a.resource_production_info = read_resource_info(r)?;
    }
    if version >= 8 {
        a.generated_lots = read_lots(r)?;
    }
    finish_legacy(&mut a);
    Ok(a)
}

fn read_v9_11(r: &mut ByteReader<'_>, version: u32) -> Result<InternalActivity> {
    let mut a = read_core(r, version)?;
    read_production_settings(r, &mut a)?;
    read_v4_to_v6_sections(r, &mut a, version)?;
    a.resource_production_info = read_resource_info(r)?;
    a.generated_lots = read_lots(r)?;
    a.split_id = r.read_option(|r| r.read_u64())?;
    a.actual_resources_used = read_resource_list(r)?;
    a.batch = r.read_option(read_batch)?;
    if version < 10 {
        a.finalize_jit_calculations();
    }
    Ok(a)
}

/// Fields every version starts with.
fn read_core(r: &mut ByteReader<'_>, version: u32) -> Result<InternalActivity> {
    let id = ActivityId(r.read_u64()?);
    let external_id = r.read_string()?;
    let operation = OperationRef::new(r.read_u64()?, r.read_u64()?);
    let required = r.read_decimal()?;

    let mut a = InternalActivity::new(id, operation, required).with_external_id(external_id);
    a.base.reported_good_qty = r.read_decimal()?;
    a.base.reported_scrap_qty = r.read_decimal()?;
    a.base.anchor_date = r.read_timestamp()?;
    a.base.reported_start_date = r.read_timestamp()?;
    a.base.reported_finish_date = r.read_timestamp()?;
    let code = r.read_u8()?;
    a.production_status = ProductionStatus::from_code(code)
        .ok_or_else(|| ActivityError::Corrupt(format!("unknown production status {code}")))?;
    a.base.flags = ActivityFlags::from_bits(r.read_u32()?);

    a.reported.setup_span = r.read_span()?;
    a.reported.run_span = r.read_span()?;
    a.reported.post_processing_span = r.read_span()?;
    if version >= 2 {
        a.reported.storage_span = r.read_span()?;
        a.reported.clean_span = r.read_span()?;
    }

    let locks = r.read_len()?;
    for _ in 0..locks {
        let index = r.read_u32()? as usize;
        a.resource_locks.lock(index, ResourceKey(r.read_u64()?));
    }
    a.comments = r.read_string()?;
    Ok(a)
}

/// Version 3 additions.
fn read_production_settings(r: &mut ByteReader<'_>, a: &mut InternalActivity) -> Result<()> {
    a.production_info = read_info_override(r)?;
    let code = r.read_u8()?;
    a.people_usage = PeopleUsage::from_code(code)
        .ok_or_else(|| ActivityError::Corrupt(format!("unknown people usage {code}")))?;
    a.nbr_of_people = r.read_decimal()?;
    Ok(())
}

/// Version 4 to 6 additions, shared by every reader from 6 on.
fn read_v4_to_v6_sections(
    r: &mut ByteReader<'_>,
    a: &mut InternalActivity,
    version: u32,
) -> Result<()> {
    a.reported.processing_start_date = r.read_timestamp()?;
    a.reported.end_of_run_date = r.read_timestamp()?;
    a.buffer = read_buffer(r, version)?;
    a.batch_amount = r.read_decimal()?;
    a.reported.end_of_post_processing_date = r.read_timestamp()?;
    a.reported.end_of_storage_date = r.read_timestamp()?;
    a.reported.clean_out_grade = r.read_i32()?;
    Ok(())
}

/// Records from before batch linkage was saved cannot stay scheduled.
fn finish_legacy(a: &mut InternalActivity) {
    a.base.set_flag(ActivityFlag::Scheduled, false);
    a.finalize_jit_calculations();
}

fn read_info_override(r: &mut ByteReader<'_>) -> Result<ProductionInfoOverride> {
    fn span(r: &mut ByteReader<'_>) -> Result<Overridable<TimeSpan>> {
        let value = r.read_option(|r| r.read_span())?;
        Ok(Overridable {
            value,
            manual_updates_only: r.read_bool()?,
        })
    }
    fn qty(r: &mut ByteReader<'_>) -> Result<Overridable<rust_decimal::Decimal>> {
        let value = r.read_option(|r| r.read_decimal())?;
        Ok(Overridable {
            value,
            manual_updates_only: r.read_bool()?,
        })
    }
    Ok(ProductionInfoOverride {
        cycle_span: span(r)?,
        setup_span: span(r)?,
        post_processing_span: span(r)?,
        clean_span: span(r)?,
        storage_span: span(r)?,
        qty_per_cycle: qty(r)?,
        planning_scrap_percent: qty(r)?,
        transfer_qty: qty(r)?,
    })
}

fn read_buffer_record(
    r: &mut ByteReader<'_>,
    version: u32,
) -> Result<(ResourceKey, ResourceBufferInfo)> {
    let key = ResourceKey(r.read_u64()?);
    let mut info = ResourceBufferInfo::new();
    info.buffer_end = r.read_timestamp()?;
    info.buffer_need = r.read_timestamp()?;
    info.dbr_jit_start = r.read_timestamp()?;
    info.sequence_head_start_window_end = r.read_timestamp()?;
    info.release_date = r.read_timestamp()?;
    info.jit_start = r.read_timestamp()?;
    info.jit_transfer_start = r.read_timestamp()?;
    if version >= 10 {
        if let Some(span) = r.read_option(|r| r.read_span())? {
            info.set_dynamic_buffer(span)
                .map_err(|e| ActivityError::Corrupt(e.message))?;
        }
    }
    Ok((key, info))
}

fn read_buffer(r: &mut ByteReader<'_>, version: u32) -> Result<BufferInfo> {
    let count = r.read_len()?;
    let mut per_resource = BTreeMap::new();
    for _ in 0..count {
        let (key, info) = read_buffer_record(r, version)?;
        per_resource.insert(key, info);
    }

    let earliest = match version {
        v if v < 10 => None,
        // v10 stored only the key; the record is taken from the per-resource map.
        10 => match r.read_option(|r| r.read_u64())? {
            Some(key) => {
                let resource = ResourceKey(key);
                let info = per_resource.get(&resource).copied().ok_or_else(|| {
                    ActivityError::Corrupt(format!("earliest buffer names unknown {resource}"))
                })?;
                Some(EarliestBuffer { resource, info })
            }
            None => None,
        },
        _ => r
            .read_option(|r| read_buffer_record(r, version))?
            .map(|(resource, info)| EarliestBuffer { resource, info }),
    };
    Ok(BufferInfo::restore(per_resource, earliest))
}

fn read_resource_info(
    r: &mut ByteReader<'_>,
) -> Result<BTreeMap<ResourceKey, ProductionInfoOverride>> {
    let count = r.read_len()?;
    let mut table = BTreeMap::new();
    for _ in 0..count {
        let key = ResourceKey(r.read_u64()?);
        table.insert(key, read_info_override(r)?);
    }
    Ok(table)
}

fn read_lots(r: &mut ByteReader<'_>) -> Result<BTreeMap<String, String>> {
    let count = r.read_len()?;
    let mut lots = BTreeMap::new();
    for _ in 0..count {
        let product = r.read_string()?;
        lots.insert(product, r.read_string()?);
    }
    Ok(lots)
}

fn read_resource_list(r: &mut ByteReader<'_>) -> Result<Vec<ResourceKey>> {
    let count = r.read_len()?;
    (0..count).map(|_| Ok(ResourceKey(r.read_u64()?))).collect()
}

fn read_batch(r: &mut ByteReader<'_>) -> Result<Batch> {
    Ok(Batch {
        id: BatchId(r.read_u64()?),
        start: r.read_timestamp()?,
        setup_end: r.read_timestamp()?,
        run_end: r.read_timestamp()?,
        post_processing_end: r.read_timestamp()?,
        storage_end: r.read_timestamp()?,
        end: r.read_timestamp()?,
        resources: read_resource_list(r)?,
    })
}

// ================================
// Writer
// ================================

/// Writes `a` in the current layout.
pub(crate) fn write_current(w: &mut ByteWriter, a: &InternalActivity) {
    let base = &a.base;
    w.write_u64(base.id.0);
    w.write_str(&base.external_id);
    w.write_u64(base.operation.job_id.0);
    w.write_u64(base.operation.operation_id.0);
    w.write_decimal(base.required_finish_qty());
    w.write_decimal(base.reported_good_qty);
    w.write_decimal(base.reported_scrap_qty);
    w.write_timestamp(base.anchor_date);
    w.write_timestamp(base.reported_start_date);
    w.write_timestamp(base.reported_finish_date());
    w.write_u8(a.production_status.code());
    w.write_u32(base.flags.bits());

    let rep = &a.reported;
    for span in [
        rep.setup_span,
        rep.run_span,
        rep.post_processing_span,
        rep.storage_span,
        rep.clean_span,
    ] {
        w.write_span(span);
    }

    w.write_len(a.resource_locks.len());
    for (index, resource) in a.resource_locks.iter() {
        w.write_u32(u32::try_from(index).unwrap_or(u32::MAX));
        w.write_u64(resource.0);
    }
    w.write_str(&a.comments);

    write_info_override(w, &a.production_info);
    w.write_u8(a.people_usage.code());
    w.write_decimal(a.nbr_of_people);

    w.write_timestamp(rep.processing_start_date);
    w.write_timestamp(rep.end_of_run_date);
    write_buffer(w, &a.buffer);
    w.write_decimal(a.batch_amount);
    w.write_timestamp(rep.end_of_post_processing_date);
    w.write_timestamp(rep.end_of_storage_date);
    w.write_i32(rep.clean_out_grade);

    w.write_len(a.resource_production_info.len());
    for (key, info) in &a.resource_production_info {
        w.write_u64(key.0);
        write_info_override(w, info);
    }

    w.write_len(a.generated_lots.len());
    for (product, lot) in &a.generated_lots {
        w.write_str(product);
        w.write_str(lot);
    }

    w.write_option(a.split_id, |w, v| w.write_u64(v));
    write_resource_list(w, &a.actual_resources_used);
    w.write_option(a.batch.as_ref(), write_batch);
}

fn write_info_override(w: &mut ByteWriter, o: &ProductionInfoOverride) {
    for f in [
        &o.cycle_span,
        &o.setup_span,
        &o.post_processing_span,
        &o.clean_span,
        &o.storage_span,
    ] {
        w.write_option(f.value, |w, v| w.write_span(v));
        w.write_bool(f.manual_updates_only);
    }
    for f in [&o.qty_per_cycle, &o.planning_scrap_percent, &o.transfer_qty] {
        w.write_option(f.value, |w, v| w.write_decimal(v));
        w.write_bool(f.manual_updates_only);
    }
}

fn write_buffer_record(w: &mut ByteWriter, key: ResourceKey, info: &ResourceBufferInfo) {
    w.write_u64(key.0);
    for date in [
        info.buffer_end,
        info.buffer_need,
        info.dbr_jit_start,
        info.sequence_head_start_window_end,
        info.release_date,
        info.jit_start,
        info.jit_transfer_start,
    ] {
        w.write_timestamp(date);
    }
    w.write_option(info.dynamic_buffer(), |w, v| w.write_span(v));
}

fn write_buffer(w: &mut ByteWriter, buffer: &BufferInfo) {
    w.write_len(buffer.resource_count());
    for (key, info) in buffer.resources() {
        write_buffer_record(w, key, info);
    }
    w.write_option(buffer.earliest(), |w, e| {
        write_buffer_record(w, e.resource, &e.info)
    });
}

fn write_resource_list(w: &mut ByteWriter, list: &[ResourceKey]) {
    w.write_len(list.len());
    for key in list {
        w.write_u64(key.0);
    }
}

fn write_batch(w: &mut ByteWriter, batch: &Batch) {
    w.write_u64(batch.id.0);
    for date in [
        batch.start,
        batch.setup_end,
        batch.run_end,
        batch.post_processing_end,
        batch.storage_end,
        batch.end,
    ] {
        w.write_timestamp(date);
    }
    write_resource_list(w, &batch.resources);
}
