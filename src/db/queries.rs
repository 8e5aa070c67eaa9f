use crate::models::{Invoice, InvoiceItem, InvoiceStatus, InvoiceUpdate, NewInvoice, NewInvoiceItem};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// 插入发票及其明细 (同一事务)
pub async fn insert_invoice(
    pool: &PgPool,
    new: &NewInvoice,
) -> Result<Invoice, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            id, invoice_number, vendor, amount, currency,
            invoice_date, due_date, status, file_url, extracted_data
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, invoice_number, vendor, amount, currency,
                  invoice_date, due_date, status, file_url, extracted_data,
                  notes, approved_by, approved_at, rejection_reason,
                  created_at, updated_at
        "#
    )
    .bind(Uuid::new_v4())
    .bind(&new.invoice_number)
    .bind(&new.vendor)
    .bind(&new.amount)
    .bind(&new.currency)
    .bind(new.invoice_date)
    .bind(new.due_date)
    .bind(new.status)
    .bind(&new.file_url)
    .bind(&new.extracted_data)
    .fetch_one(&mut *tx)
    .await?;

    insert_items(&mut tx, invoice.id, &new.items).await?;
    tx.commit().await?;

    tracing::info!(
        "Created invoice {} ({}) with {} items",
        invoice.id, invoice.invoice_number, new.items.len()
    );
    Ok(invoice)
}

/// 批量插入明细 (每1000条分块)，保留原始顺序
async fn insert_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
    items: &[NewInvoiceItem],
) -> Result<(), sqlx::Error> {
    for (chunk_idx, chunk) in items.chunks(1000).enumerate() {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO invoice_items (
                id, invoice_id, position, description, quantity, unit_price, total
            ) "
        );

        query_builder.push_values(chunk.iter().enumerate(), |mut b, (idx, item)| {
            let position = (chunk_idx * 1000 + idx) as i32;
            b.push_bind(Uuid::new_v4())
                .push_bind(invoice_id)
                .push_bind(position)
                .push_bind(&item.description)
                .push_bind(item.quantity)
                .push_bind(item.unit_price.clone())
                .push_bind(item.total.clone());
        });

        query_builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

/// 查询单张发票
pub async fn get_invoice(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, invoice_number, vendor, amount, currency,
               invoice_date, due_date, status, file_url, extracted_data,
               notes, approved_by, approved_at, rejection_reason,
               created_at, updated_at
        FROM invoices
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// 查询多张发票的明细 (按发票、行号排序)
pub async fn list_items_for_invoices(
    pool: &PgPool,
    invoice_ids: &[Uuid],
) -> Result<Vec<InvoiceItem>, sqlx::Error> {
    if invoice_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, description, quantity, unit_price, total
        FROM invoice_items
        WHERE invoice_id = ANY($1)
        ORDER BY invoice_id, position
        "#
    )
    .bind(invoice_ids)
    .fetch_all(pool)
    .await
}

/// 分页查询发票 (创建时间倒序)
pub async fn list_invoices(
    pool: &PgPool,
    status: Option<InvoiceStatus>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, invoice_number, vendor, amount, currency,
               invoice_date, due_date, status, file_url, extracted_data,
               notes, approved_by, approved_at, rejection_reason,
               created_at, updated_at
        FROM invoices
        WHERE ($1::invoice_status IS NULL OR status = $1)
        ORDER BY created_at DESC
        OFFSET $2
        LIMIT $3
        "#
    )
    .bind(status)
    .bind(offset)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// 统计发票数量
pub async fn count_invoices(
    pool: &PgPool,
    status: Option<InvoiceStatus>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT count(*)
        FROM invoices
        WHERE ($1::invoice_status IS NULL OR status = $1)
        "#
    )
    .bind(status)
    .fetch_one(pool)
    .await
}

/// 部分更新发票；`items` 为 Some 时整体替换明细
pub async fn update_invoice(
    pool: &PgPool,
    id: Uuid,
    update: &InvoiceUpdate,
    items: Option<&[NewInvoiceItem]>,
) -> Result<Option<Invoice>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices SET
            invoice_number = COALESCE($2, invoice_number),
            vendor         = COALESCE($3, vendor),
            amount         = COALESCE($4, amount),
            currency       = COALESCE($5, currency),
            invoice_date   = COALESCE($6, invoice_date),
            due_date       = COALESCE($7, due_date),
            notes          = COALESCE($8, notes),
            updated_at     = now()
        WHERE id = $1
        RETURNING id, invoice_number, vendor, amount, currency,
                  invoice_date, due_date, status, file_url, extracted_data,
                  notes, approved_by, approved_at, rejection_reason,
                  created_at, updated_at
        "#
    )
    .bind(id)
    .bind(&update.invoice_number)
    .bind(&update.vendor)
    .bind(&update.amount)
    .bind(&update.currency)
    .bind(update.invoice_date)
    .bind(update.due_date)
    .bind(&update.notes)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(invoice) = invoice else {
        tx.rollback().await?;
        return Ok(None);
    };

    if let Some(items) = items {
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, id, items).await?;
    }

    tx.commit().await?;
    Ok(Some(invoice))
}

/// 删除发票 (明细级联删除)，返回被删除的记录
pub async fn delete_invoice(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        r#"
        DELETE FROM invoices
        WHERE id = $1
        RETURNING id, invoice_number, vendor, amount, currency,
                  invoice_date, due_date, status, file_url, extracted_data,
                  notes, approved_by, approved_at, rejection_reason,
                  created_at, updated_at
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// 审批通过：记录审批人、审批时间；notes 未提供时保持原值
pub async fn approve_invoice(
    pool: &PgPool,
    id: Uuid,
    approved_by: &str,
    notes: Option<&str>,
    approved_at: DateTime<Utc>,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices SET
            status      = $2,
            approved_by = $3,
            approved_at = $4,
            notes       = COALESCE($5, notes),
            updated_at  = now()
        WHERE id = $1
        RETURNING id, invoice_number, vendor, amount, currency,
                  invoice_date, due_date, status, file_url, extracted_data,
                  notes, approved_by, approved_at, rejection_reason,
                  created_at, updated_at
        "#
    )
    .bind(id)
    .bind(InvoiceStatus::Approved)
    .bind(approved_by)
    .bind(approved_at)
    .bind(notes)
    .fetch_optional(pool)
    .await
}

/// 拒绝发票并记录原因
pub async fn reject_invoice(
    pool: &PgPool,
    id: Uuid,
    reason: &str,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as::<_, Invoice>(
        r#"
        UPDATE invoices SET
            status           = $2,
            rejection_reason = $3,
            updated_at       = now()
        WHERE id = $1
        RETURNING id, invoice_number, vendor, amount, currency,
                  invoice_date, due_date, status, file_url, extracted_data,
                  notes, approved_by, approved_at, rejection_reason,
                  created_at, updated_at
        "#
    )
    .bind(id)
    .bind(InvoiceStatus::Rejected)
    .bind(reason)
    .fetch_optional(pool)
    .await
}
