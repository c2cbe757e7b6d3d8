//! Static schema descriptors for the tables this region materializes.
//!
//! The descriptors are the whitelist for dynamic statement synthesis: a
//! payload column absent from its table descriptor never reaches SQL.

use regionsync_core::SyncTable;

/// Known columns and conflict target for one replicated table.
#[derive(Debug)]
pub struct TableSchema {
    table: SyncTable,
    columns: &'static [&'static str],
}

impl TableSchema {
    pub fn table(&self) -> SyncTable {
        self.table
    }

    pub fn name(&self) -> &'static str {
        self.table.as_str()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

static PRODUCTS: TableSchema = TableSchema {
    table: SyncTable::Products,
    columns: &[
        "id",
        "product_name",
        "description",
        "price",
        "stock_quantity",
        "category",
        "manufacturer_country",
        "created_by_user_id",
        "sync_source",
        "version",
        "created_at",
        "updated_at",
    ],
};

static SALES: TableSchema = TableSchema {
    table: SyncTable::Sales,
    columns: &[
        "id",
        "sale_date",
        "product_id",
        "product_name",
        "quantity",
        "unit_price",
        "total_amount",
        "customer_name",
        "sale_region",
        "sync_source",
        "salesperson_user_id",
        "version",
        "created_at",
        "updated_at",
    ],
};

/// Descriptor for a table, or `None` for tables the core never writes.
pub fn schema_for(table: SyncTable) -> Option<&'static TableSchema> {
    match table {
        SyncTable::Users => None,
        SyncTable::Products => Some(&PRODUCTS),
        SyncTable::Sales => Some(&SALES),
    }
}
